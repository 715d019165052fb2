//! Graders that run a candidate against every stored fixture.
//!
//! Both graders share the same loop: list the dataset tables, produce a
//! candidate result per dataset, compare it with the person-ordered answer
//! table and record one outcome. Setup failures (listing tables, reading a
//! fixture) abort the run; candidate failures only fail their fixture.

pub mod function;
pub mod query;
pub mod report;

pub use function::{Candidate, FunctionGrader};
pub use query::{PLACEHOLDER_TABLE, QueryGrader, Substitution, rewrite_table_reference};
pub use report::{FixtureOutcome, FixtureResult, GradeReport};

use crate::compare::{Comparison, compare_tables};
use crate::config::SessionOptions;
use crate::records::{answer_table_name, is_answer_table};
use datafusion::arrow::compute::{SortOptions, sort_to_indices, take_record_batch};
use datafusion::arrow::record_batch::RecordBatch;
use std::cmp::Ordering;
use std::collections::HashSet;
use taskgrade_common::{CommonError, ErrorContext, Result, TableStore};

/// Column the answer tables are ordered by before comparison.
const ANSWER_SORT_COLUMN: &str = "person";

/// Compare names treating digit runs as numbers, so `dataset_2` sorts
/// before `dataset_10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let mut l_digits = String::new();
                while let Some(c) = left.next_if(char::is_ascii_digit) {
                    l_digits.push(c);
                }
                let mut r_digits = String::new();
                while let Some(c) = right.next_if(char::is_ascii_digit) {
                    r_digits.push(c);
                }
                let l_trimmed = l_digits.trim_start_matches('0');
                let r_trimmed = r_digits.trim_start_matches('0');
                let ordering = l_trimmed
                    .len()
                    .cmp(&r_trimmed.len())
                    .then_with(|| l_trimmed.cmp(r_trimmed))
                    .then_with(|| l_digits.len().cmp(&r_digits.len()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

/// The stored tables that have a paired answer table, in natural order.
///
/// Anything else in the store (answer tables, the orders fixture) is not a
/// dataset and is skipped.
pub async fn dataset_tables(store: &dyn TableStore) -> Result<Vec<String>> {
    let tables: HashSet<String> = store.list_tables().await?.into_iter().collect();
    let mut datasets: Vec<String> = tables
        .iter()
        .filter(|name| !is_answer_table(name) && tables.contains(&answer_table_name(name)))
        .cloned()
        .collect();
    datasets.sort_by(|a, b| natural_cmp(a, b));
    Ok(datasets)
}

/// Read the answer table paired with `dataset`, ordered by person.
pub async fn load_reference(store: &dyn TableStore, dataset: &str) -> Result<RecordBatch> {
    let answer_name = answer_table_name(dataset);
    let answer = store.read_table(&answer_name).await?;
    sort_by_column(&answer, ANSWER_SORT_COLUMN)
        .with_serialization_context(|| format!("Failed to order answer table {answer_name}"))
}

fn sort_by_column(batch: &RecordBatch, column: &str) -> Result<RecordBatch> {
    let index = batch.schema().index_of(column).map_err(|e| {
        CommonError::serialization_error_with_source(
            format!("Answer table has no {column} column"),
            e,
        )
    })?;
    let indices = sort_to_indices(
        batch.column(index),
        Some(SortOptions {
            descending: false,
            nulls_first: false,
        }),
        None,
    )
    .with_serialization_context(|| format!("Failed to sort by {column}"))?;
    take_record_batch(batch, &indices)
        .with_serialization_context(|| format!("Failed to reorder rows by {column}"))
}

fn outcome_from(comparison: Comparison) -> FixtureOutcome {
    match comparison {
        Comparison::Equal => FixtureOutcome::Passed,
        Comparison::Different(mismatch) => FixtureOutcome::Mismatch(mismatch),
    }
}

/// Compare a candidate result against the reference for one dataset.
pub(crate) fn judge(
    dataset: &str,
    candidate: anyhow::Result<RecordBatch>,
    expected: &RecordBatch,
) -> FixtureResult {
    let outcome = match candidate {
        Ok(actual) => outcome_from(compare_tables(&actual, expected)),
        Err(e) => FixtureOutcome::Failed(format!("{e:#}")),
    };
    FixtureResult::new(dataset, outcome)
}

/// Grade a table transformation against every fixture and print the summary.
pub async fn grade_function<C: Candidate>(
    store: &dyn TableStore,
    candidate: &C,
) -> Result<GradeReport> {
    let report = FunctionGrader::new(store).grade(candidate).await?;
    report.print_summary();
    Ok(report)
}

/// Grade a query reading from `tasks` against every fixture and print the summary.
pub async fn grade_query(store: &dyn TableStore, query: &str) -> Result<GradeReport> {
    let report = QueryGrader::new(store, SessionOptions::default())
        .grade(query)
        .await?;
    report.print_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::ToRecordBatch;
    use crate::records::SkipSummary;
    use datafusion::arrow::array::StringArray;
    use taskgrade_common::TableStoreBuilder;

    #[test]
    fn test_natural_order_of_dataset_names() {
        let mut names = vec!["dataset_10", "dataset_2", "dataset_1", "dataset_0", "customer"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["customer", "dataset_0", "dataset_1", "dataset_2", "dataset_10"]
        );
    }

    #[test]
    fn test_natural_order_ties() {
        assert_eq!(natural_cmp("a01", "a1"), Ordering::Greater);
        assert_eq!(natural_cmp("a1", "a1"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
    }

    #[tokio::test]
    async fn test_dataset_tables_skip_answers() {
        let store = TableStoreBuilder::new().build().await.unwrap();
        let answer = SkipSummary::to_record_batch(&[]).unwrap();
        for name in ["dataset_10", "dataset_10__", "dataset_9", "dataset_9__"] {
            store.write_table(name, &answer).await.unwrap();
        }

        let datasets = dataset_tables(store.as_ref()).await.unwrap();
        assert_eq!(datasets, vec!["dataset_9", "dataset_10"]);
    }

    #[tokio::test]
    async fn test_dataset_tables_require_an_answer_table() {
        let store = TableStoreBuilder::new().build().await.unwrap();
        let answer = SkipSummary::to_record_batch(&[]).unwrap();
        for name in ["orders", "customer_activity", "dataset_0", "dataset_0__", "dataset_1"] {
            store.write_table(name, &answer).await.unwrap();
        }

        let datasets = dataset_tables(store.as_ref()).await.unwrap();
        assert_eq!(datasets, vec!["dataset_0"]);
    }

    #[tokio::test]
    async fn test_reference_is_ordered_by_person() {
        let store = TableStoreBuilder::new().build().await.unwrap();
        let unordered = SkipSummary::to_record_batch(&[
            SkipSummary {
                person: "Person C".into(),
                skipped: 0,
            },
            SkipSummary {
                person: "Person A".into(),
                skipped: 2,
            },
        ])
        .unwrap();
        store.write_table("dataset_0__", &unordered).await.unwrap();

        let reference = load_reference(store.as_ref(), "dataset_0").await.unwrap();
        let people = reference
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(people.value(0), "Person A");
        assert_eq!(people.value(1), "Person C");
    }

    #[tokio::test]
    async fn test_missing_reference_propagates() {
        let store = TableStoreBuilder::new().build().await.unwrap();
        let err = load_reference(store.as_ref(), "dataset_0").await.unwrap_err();
        assert!(matches!(err, CommonError::NotFoundError { .. }));
    }
}
