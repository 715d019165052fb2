//! The skipped-task analysis that produces every reference answer.
//!
//! A task counts as skipped when the person left it incomplete but completed
//! at least one later task. Scanning a person's tasks from the highest
//! ordinality down, that is an incomplete task met after at least one
//! completed one.

use crate::columnar::{FromRecordBatch, ToRecordBatch};
use crate::records::{CompletionRecord, SkipSummary};
use datafusion::arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;

/// Count skipped tasks in one person's `(ordinality, completed)` history.
pub fn count_skipped<I>(history: I) -> i64
where
    I: IntoIterator<Item = (i64, bool)>,
{
    let mut history: Vec<(i64, bool)> = history.into_iter().collect();
    history.sort_by(|a, b| b.0.cmp(&a.0));

    let mut completed_so_far = 0i64;
    let mut skipped = 0i64;
    for (_, completed) in history {
        if completed {
            completed_so_far += 1;
        } else if completed_so_far > 0 {
            skipped += 1;
        }
    }
    skipped
}

/// One summary row per distinct person, ordered by person.
pub fn compute_reference_answer(records: &[CompletionRecord]) -> Vec<SkipSummary> {
    let mut by_person: BTreeMap<&str, Vec<(i64, bool)>> = BTreeMap::new();
    for record in records {
        by_person
            .entry(record.person.as_str())
            .or_default()
            .push((record.ordinality, record.completed));
    }

    by_person
        .into_iter()
        .map(|(person, history)| SkipSummary {
            person: person.to_string(),
            skipped: count_skipped(history),
        })
        .collect()
}

/// The reference analysis as a gradable table transformation.
///
/// Scores `total/total` against any fixture set; `grade-reference` uses it
/// to check a store.
pub fn reference_solution(raw: &RecordBatch) -> anyhow::Result<RecordBatch> {
    let records = CompletionRecord::from_record_batch(raw)?;
    let answer = compute_reference_answer(&records);
    Ok(SkipSummary::to_record_batch(&answer)?)
}
