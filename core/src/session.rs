//! SQL execution over fixture tables using DataFusion.
//!
//! Sessions run with a single target partition: candidate results are
//! compared row by row, so scans must hand rows back in stored order.

use crate::config::SessionOptions;
use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::{SessionConfig, SessionContext};
use std::sync::Arc;
use taskgrade_common::{ErrorContext, Result};
use tracing::debug;

/// A DataFusion session holding the tables one grading step needs.
pub struct GradingSession {
    context: SessionContext,
}

impl std::fmt::Debug for GradingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradingSession")
            .field("session_id", &self.context.session_id())
            .finish()
    }
}

impl GradingSession {
    /// Create a new session
    pub fn new(options: &SessionOptions) -> Self {
        let config = SessionConfig::new()
            .with_batch_size(options.batch_size)
            .with_target_partitions(1);

        Self {
            context: SessionContext::new_with_config(config),
        }
    }

    /// Register a table under `name`, replacing any table of that name.
    pub fn register_batch(&self, name: &str, batch: RecordBatch) -> Result<()> {
        let table = MemTable::try_new(batch.schema(), vec![vec![batch]])
            .with_query_context(|| format!("Failed to build in-memory table {name}"))?;
        self.context
            .deregister_table(name)
            .with_query_context(|| format!("Failed to replace table {name}"))?;
        self.context
            .register_table(name, Arc::new(table))
            .with_query_context(|| format!("Failed to register table {name}"))?;
        Ok(())
    }

    /// Execute a query and return its whole result as one batch.
    pub async fn execute_sql(&self, sql: &str) -> Result<RecordBatch> {
        let df = self
            .context
            .sql(sql)
            .await
            .with_query_context(|| "Failed to plan query".to_string())?;
        let planned_schema = df.schema().inner().clone();
        let batches = df
            .collect()
            .await
            .with_query_context(|| "Failed to execute query".to_string())?;

        let schema = batches
            .first()
            .map(|batch| batch.schema())
            .unwrap_or(planned_schema);
        concat_batches(&schema, &batches)
            .with_query_context(|| "Failed to combine query results".to_string())
    }

    /// Execute a statement (DDL) and discard its output.
    pub async fn execute_statement(&self, sql: &str) -> Result<()> {
        debug!(statement = sql, "executing statement");
        self.context
            .sql(sql)
            .await
            .with_query_context(|| format!("Failed to execute statement: {sql}"))?
            .collect()
            .await
            .with_query_context(|| format!("Failed to execute statement: {sql}"))?;
        Ok(())
    }

    /// Run `query` with `placeholder` bound to `table` through a view.
    ///
    /// The view is dropped again whether or not the query succeeds.
    pub async fn query_through_view(
        &self,
        placeholder: &str,
        table: &str,
        query: &str,
    ) -> Result<RecordBatch> {
        self.execute_statement(&format!(
            "CREATE OR REPLACE VIEW {placeholder} AS SELECT * FROM {table}"
        ))
        .await?;
        let result = self.execute_sql(query).await;
        self.execute_statement(&format!("DROP VIEW IF EXISTS {placeholder}"))
            .await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Array, Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use taskgrade_common::CommonError;

    fn people_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("person", DataType::Utf8, false),
            Field::new("ordinality", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["Person B", "Person A", "Person B"])),
                Arc::new(Int64Array::from(vec![0, 1, 2])),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_scan_preserves_row_order() {
        let session = GradingSession::new(&SessionOptions::default());
        session.register_batch("dataset_0", people_batch()).unwrap();

        let result = session.execute_sql("SELECT * FROM dataset_0").await.unwrap();
        assert_eq!(result.num_rows(), 3);
        let ordinality = result
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ordinality.values().to_vec(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_empty_result_keeps_schema() {
        let session = GradingSession::new(&SessionOptions::default());
        session.register_batch("dataset_0", people_batch()).unwrap();

        let result = session
            .execute_sql("SELECT person FROM dataset_0 WHERE ordinality > 10")
            .await
            .unwrap();
        assert_eq!(result.num_rows(), 0);
        assert_eq!(result.schema().field(0).name(), "person");
    }

    #[tokio::test]
    async fn test_query_through_view_binds_placeholder() {
        let session = GradingSession::new(&SessionOptions::default());
        session.register_batch("dataset_7", people_batch()).unwrap();

        let result = session
            .query_through_view(
                "tasks",
                "dataset_7",
                "SELECT person, count(*) AS n FROM tasks GROUP BY person ORDER BY person",
            )
            .await
            .unwrap();
        assert_eq!(result.num_rows(), 2);
        let people = result
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(people.value(0), "Person A");

        // The view is gone afterwards.
        assert!(session.execute_sql("SELECT * FROM tasks").await.is_err());
    }

    #[tokio::test]
    async fn test_failed_query_still_drops_view() {
        let session = GradingSession::new(&SessionOptions::default());
        session.register_batch("dataset_7", people_batch()).unwrap();

        let err = session
            .query_through_view("tasks", "dataset_7", "SELECT nope FROM tasks")
            .await
            .unwrap_err();
        assert!(matches!(err, CommonError::QueryError { .. }));
        assert!(session.execute_sql("SELECT * FROM tasks").await.is_err());
    }

    #[tokio::test]
    async fn test_register_replaces_table() {
        let session = GradingSession::new(&SessionOptions::default());
        session.register_batch("t", people_batch()).unwrap();
        session
            .register_batch("t", people_batch().slice(0, 1))
            .unwrap();

        let result = session.execute_sql("SELECT * FROM t").await.unwrap();
        assert_eq!(result.num_rows(), 1);
        assert!(result.column(0).len() == 1);
    }
}
