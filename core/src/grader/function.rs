//! Grading of table transformations.

use super::report::{FixtureOutcome, GradeReport};
use super::{dataset_tables, judge, load_reference};
use datafusion::arrow::record_batch::RecordBatch;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use taskgrade_common::{Result, TableStore};
use tracing::{debug, info, warn};

/// A candidate transformation from a raw dataset table to an answer table.
pub trait Candidate {
    fn transform(&self, raw: &RecordBatch) -> anyhow::Result<RecordBatch>;
}

impl<F> Candidate for F
where
    F: Fn(&RecordBatch) -> anyhow::Result<RecordBatch>,
{
    fn transform(&self, raw: &RecordBatch) -> anyhow::Result<RecordBatch> {
        self(raw)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "candidate panicked".to_string()
    }
}

/// Runs a [`Candidate`] over every fixture of a store.
pub struct FunctionGrader<'a> {
    store: &'a dyn TableStore,
}

impl<'a> FunctionGrader<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        Self { store }
    }

    pub async fn grade<C: Candidate + ?Sized>(&self, candidate: &C) -> Result<GradeReport> {
        let mut report = GradeReport::new();

        for dataset in dataset_tables(self.store).await? {
            let raw = self.store.read_table(&dataset).await?;
            let expected = load_reference(self.store, &dataset).await?;

            let produced = catch_unwind(AssertUnwindSafe(|| candidate.transform(&raw)))
                .unwrap_or_else(|payload| {
                    Err(anyhow::anyhow!("panicked: {}", panic_message(payload)))
                });
            let result = judge(&dataset, produced, &expected);

            match &result.outcome {
                FixtureOutcome::Passed => debug!(dataset = %dataset, "fixture passed"),
                outcome => warn!(dataset = %dataset, %outcome, "fixture not passed"),
            }
            report.push(result);
        }

        info!(passed = report.passed(), total = report.total(), "function grading finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::{FromRecordBatch, ToRecordBatch};
    use crate::compare::Mismatch;
    use crate::generator::persist_dataset;
    use crate::records::{CompletionRecord, SkipSummary, Task};
    use crate::reference::{compute_reference_answer, reference_solution};
    use taskgrade_common::TableStoreBuilder;

    async fn store_with_fixture() -> std::sync::Arc<dyn TableStore> {
        let store = TableStoreBuilder::new().build().await.unwrap();
        let mut records = Vec::new();
        for person in ["Person A", "Person B"] {
            for (i, completed) in [true, false, true].into_iter().enumerate() {
                let task = Task {
                    name: format!("task-{i}"),
                    ordinality: i as i64,
                };
                records.push(CompletionRecord::new(person, &task, completed));
            }
        }
        let answer = compute_reference_answer(&records);
        persist_dataset(store.as_ref(), "dataset_0", &records, &answer)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_reference_solution_passes() {
        let store = store_with_fixture().await;
        let report = FunctionGrader::new(store.as_ref())
            .grade(&reference_solution)
            .await
            .unwrap();
        assert_eq!(report.summary(), "1/1 tests were passed.");
    }

    #[tokio::test]
    async fn test_wrong_values_are_a_mismatch() {
        let store = store_with_fixture().await;
        let always_zero = |raw: &RecordBatch| -> anyhow::Result<RecordBatch> {
            let records = CompletionRecord::from_record_batch(raw)?;
            let answer: Vec<SkipSummary> = compute_reference_answer(&records)
                .into_iter()
                .map(|row| SkipSummary { skipped: 0, ..row })
                .collect();
            Ok(SkipSummary::to_record_batch(&answer)?)
        };

        let report = FunctionGrader::new(store.as_ref())
            .grade(&always_zero)
            .await
            .unwrap();
        assert_eq!(report.passed(), 0);
        assert_eq!(
            report.results[0].outcome,
            FixtureOutcome::Mismatch(Mismatch::Values {
                column: "skipped".into(),
                row: 0
            })
        );
    }

    #[tokio::test]
    async fn test_panicking_candidate_fails_its_fixture() {
        let store = store_with_fixture().await;
        let panics = |_: &RecordBatch| -> anyhow::Result<RecordBatch> { panic!("no idea") };

        let report = FunctionGrader::new(store.as_ref())
            .grade(&panics)
            .await
            .unwrap();
        assert_eq!(report.total(), 1);
        match &report.results[0].outcome {
            FixtureOutcome::Failed(message) => assert!(message.contains("no idea")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_erroring_candidate_fails_its_fixture() {
        let store = store_with_fixture().await;
        let errors =
            |_: &RecordBatch| -> anyhow::Result<RecordBatch> { anyhow::bail!("column missing") };

        let report = FunctionGrader::new(store.as_ref())
            .grade(&errors)
            .await
            .unwrap();
        assert_eq!(
            report.results[0].outcome,
            FixtureOutcome::Failed("column missing".into())
        );
    }
}
