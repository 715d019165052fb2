//! Row types of the task-completion fixtures and their table encodings.

use crate::columnar::{FromRecordBatch, RecordBatchBuilder, RecordBatchExtractor, ToRecordBatch};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use taskgrade_common::Result;

/// Marks a reference-answer table: `dataset_3` is answered by `dataset_3__`.
pub const ANSWER_SUFFIX: &str = "__";

/// Name of the answer table paired with `dataset`.
pub fn answer_table_name(dataset: &str) -> String {
    format!("{dataset}{ANSWER_SUFFIX}")
}

/// Answer tables are never graded themselves.
pub fn is_answer_table(name: &str) -> bool {
    name.ends_with(ANSWER_SUFFIX)
}

/// A generated task and its position in the task sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    pub name: String,
    pub ordinality: i64,
}

/// One row of a raw dataset table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompletionRecord {
    pub person: String,
    pub task_name: String,
    pub ordinality: i64,
    pub completed: bool,
}

impl CompletionRecord {
    pub fn new(person: &str, task: &Task, completed: bool) -> Self {
        Self {
            person: person.to_string(),
            task_name: task.name.clone(),
            ordinality: task.ordinality,
            completed,
        }
    }
}

/// One row of a reference-answer table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SkipSummary {
    pub person: String,
    pub skipped: i64,
}

impl ToRecordBatch for CompletionRecord {
    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        RecordBatchBuilder::new(Self::to_schema())
            .add_column(rows.iter().map(|r| r.person.clone()).collect())
            .add_column(rows.iter().map(|r| r.task_name.clone()).collect())
            .add_column(rows.iter().map(|r| r.ordinality).collect())
            .add_column(rows.iter().map(|r| r.completed).collect())
            .build()
    }

    fn to_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("person", DataType::Utf8, false),
            Field::new("task_name", DataType::Utf8, false),
            Field::new("ordinality", DataType::Int64, false),
            Field::new("completed", DataType::Boolean, false),
        ]))
    }
}

impl FromRecordBatch for CompletionRecord {
    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let extractor = RecordBatchExtractor::new(batch);
        let people: Vec<String> = extractor.extract_named("person")?;
        let task_names: Vec<String> = extractor.extract_named("task_name")?;
        let ordinalities: Vec<i64> = extractor.extract_named("ordinality")?;
        let completed: Vec<bool> = extractor.extract_named("completed")?;

        Ok(people
            .into_iter()
            .zip(task_names)
            .zip(ordinalities)
            .zip(completed)
            .map(|(((person, task_name), ordinality), completed)| Self {
                person,
                task_name,
                ordinality,
                completed,
            })
            .collect())
    }
}

impl ToRecordBatch for SkipSummary {
    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        RecordBatchBuilder::new(Self::to_schema())
            .add_column(rows.iter().map(|r| r.person.clone()).collect())
            .add_column(rows.iter().map(|r| r.skipped).collect())
            .build()
    }

    fn to_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("person", DataType::Utf8, false),
            Field::new("skipped", DataType::Int64, false),
        ]))
    }
}

impl FromRecordBatch for SkipSummary {
    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let extractor = RecordBatchExtractor::new(batch);
        let people: Vec<String> = extractor.extract_named("person")?;
        let skipped: Vec<i64> = extractor.extract_named("skipped")?;

        Ok(people
            .into_iter()
            .zip(skipped)
            .map(|(person, skipped)| Self { person, skipped })
            .collect())
    }
}
