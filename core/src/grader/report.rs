//! Per-fixture outcomes and the aggregated grade report.

use crate::compare::Mismatch;
use std::fmt;

/// What happened to the candidate on one fixture.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureOutcome {
    Passed,
    /// The candidate ran but its table differs from the reference.
    Mismatch(Mismatch),
    /// The candidate errored or panicked.
    Failed(String),
}

impl FixtureOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, FixtureOutcome::Passed)
    }
}

impl fmt::Display for FixtureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureOutcome::Passed => write!(f, "passed"),
            FixtureOutcome::Mismatch(mismatch) => write!(f, "mismatch: {mismatch}"),
            FixtureOutcome::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureResult {
    pub dataset: String,
    pub outcome: FixtureOutcome,
}

impl FixtureResult {
    pub fn new<S: Into<String>>(dataset: S, outcome: FixtureOutcome) -> Self {
        Self {
            dataset: dataset.into(),
            outcome,
        }
    }
}

/// Outcomes of one grading pass, in fixture order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradeReport {
    pub results: Vec<FixtureResult>,
}

impl GradeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: FixtureResult) {
        self.results.push(result);
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_pass()).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }

    /// Fixtures that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &FixtureResult> {
        self.results.iter().filter(|r| !r.outcome.is_pass())
    }

    pub fn summary(&self) -> String {
        format!("{}/{} tests were passed.", self.passed(), self.total())
    }

    pub fn print_summary(&self) {
        println!("{}", self.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        let report = GradeReport::new();
        assert_eq!(report.summary(), "0/0 tests were passed.");
        assert!(report.all_passed());
    }

    #[test]
    fn test_summary_counts_only_passes() {
        let mut report = GradeReport::new();
        report.push(FixtureResult::new("dataset_0", FixtureOutcome::Passed));
        report.push(FixtureResult::new(
            "dataset_1",
            FixtureOutcome::Mismatch(Mismatch::Values {
                column: "skipped".into(),
                row: 3,
            }),
        ));
        report.push(FixtureResult::new(
            "dataset_2",
            FixtureOutcome::Failed("boom".into()),
        ));

        assert_eq!(report.passed(), 1);
        assert_eq!(report.total(), 3);
        assert_eq!(report.summary(), "1/3 tests were passed.");
        let failed: Vec<&str> = report.failures().map(|r| r.dataset.as_str()).collect();
        assert_eq!(failed, vec!["dataset_1", "dataset_2"]);
    }

    #[test]
    fn test_outcome_display() {
        let outcome = FixtureOutcome::Mismatch(Mismatch::Values {
            column: "skipped".into(),
            row: 3,
        });
        assert_eq!(outcome.to_string(), "mismatch: column skipped differs first at row 3");
    }
}
