//! Grading of SQL queries written against the `tasks` placeholder.

use super::report::{FixtureOutcome, GradeReport};
use super::{dataset_tables, judge, load_reference};
use crate::config::SessionOptions;
use crate::session::GradingSession;
use datafusion::arrow::record_batch::RecordBatch;
use regex::Regex;
use std::sync::LazyLock;
use taskgrade_common::{Result, TableStore};
use tracing::{debug, info, warn};

/// Table name candidate queries read from.
pub const PLACEHOLDER_TABLE: &str = "tasks";

/// How the placeholder is pointed at a dataset table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Substitution {
    /// Register a `tasks` view over the dataset and run the query untouched.
    #[default]
    View,
    /// Rewrite `from tasks` in the query text.
    Rewrite,
}

static TABLE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"from\s+tasks").expect("valid placeholder regex"));

/// Rewrite every `from tasks` in `query` to read from `table`.
///
/// The query is lower-cased and its line breaks become spaces first. There
/// is no word boundary after `tasks`, so `from tasks_archive` turns into
/// `from <table>_archive`.
pub fn rewrite_table_reference(query: &str, table: &str) -> String {
    let normalized = query.to_lowercase().replace("\r\n", " ").replace('\n', " ");
    TABLE_REFERENCE
        .replace_all(&normalized, format!("from {table}").as_str())
        .into_owned()
}

/// Runs a query over every fixture of a store.
pub struct QueryGrader<'a> {
    store: &'a dyn TableStore,
    options: SessionOptions,
    substitution: Substitution,
}

impl<'a> QueryGrader<'a> {
    pub fn new(store: &'a dyn TableStore, options: SessionOptions) -> Self {
        Self {
            store,
            options,
            substitution: Substitution::default(),
        }
    }

    pub fn with_substitution(mut self, substitution: Substitution) -> Self {
        self.substitution = substitution;
        self
    }

    /// Execute `query` against one dataset in a fresh session.
    pub async fn run_query(
        &self,
        dataset: &str,
        raw: RecordBatch,
        query: &str,
    ) -> Result<RecordBatch> {
        let session = GradingSession::new(&self.options);
        session.register_batch(dataset, raw)?;

        match self.substitution {
            Substitution::View => {
                session
                    .query_through_view(PLACEHOLDER_TABLE, dataset, query)
                    .await
            }
            Substitution::Rewrite => {
                let rewritten = rewrite_table_reference(query, dataset);
                debug!(dataset, query = %rewritten, "rewritten query");
                session.execute_sql(&rewritten).await
            }
        }
    }

    pub async fn grade(&self, query: &str) -> Result<GradeReport> {
        let mut report = GradeReport::new();

        for dataset in dataset_tables(self.store).await? {
            let raw = self.store.read_table(&dataset).await?;
            let expected = load_reference(self.store, &dataset).await?;

            let produced = self
                .run_query(&dataset, raw, query)
                .await
                .map_err(anyhow::Error::from);
            let result = judge(&dataset, produced, &expected);

            match &result.outcome {
                FixtureOutcome::Passed => debug!(dataset = %dataset, "fixture passed"),
                outcome => warn!(dataset = %dataset, %outcome, "fixture not passed"),
            }
            report.push(result);
        }

        info!(
            passed = report.passed(),
            total = report.total(),
            substitution = ?self.substitution,
            "query grading finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_points_query_at_dataset() {
        let rewritten = rewrite_table_reference(
            "select person, count(*) as skipped from tasks group by person",
            "dataset_3",
        );
        assert_eq!(
            rewritten,
            "select person, count(*) as skipped from dataset_3 group by person"
        );
    }

    #[test]
    fn test_rewrite_folds_case_and_line_breaks() {
        let rewritten =
            rewrite_table_reference("SELECT person\nFROM\n  Tasks\nGROUP BY person", "dataset_0");
        assert_eq!(rewritten, "select person from dataset_0 group by person");
    }

    #[test]
    fn test_rewrite_has_no_word_boundary() {
        let rewritten = rewrite_table_reference("select * from tasks_archive", "dataset_1");
        assert_eq!(rewritten, "select * from dataset_1_archive");
    }

    #[test]
    fn test_rewrite_replaces_every_occurrence() {
        let rewritten = rewrite_table_reference(
            "select * from tasks where person in (select person from tasks)",
            "dataset_2",
        );
        assert_eq!(
            rewritten,
            "select * from dataset_2 where person in (select person from dataset_2)"
        );
    }

    #[test]
    fn test_rewrite_reuses_compiled_pattern() {
        let first = rewrite_table_reference("select * from tasks", "dataset_0");
        let second = rewrite_table_reference("select * from tasks", "dataset_1");
        assert_eq!(first, "select * from dataset_0");
        assert_eq!(second, "select * from dataset_1");
        assert_eq!(TABLE_REFERENCE.as_str(), format!(r"from\s+{PLACEHOLDER_TABLE}"));
    }

    #[test]
    fn test_view_binding_is_the_default() {
        assert_eq!(Substitution::default(), Substitution::View);
    }
}
