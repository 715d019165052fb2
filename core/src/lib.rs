//! Taskgrade Core - fixture generation and grading for SQL exercises
//!
//! Generates randomized task-completion datasets with reference answers,
//! stores them as named tables, and grades learner queries and table
//! transformations against them.

pub mod catalog;
pub mod columnar;
pub mod compare;
pub mod config;
pub mod generator;
pub mod grader;
pub mod orders;
pub mod records;
pub mod reference;
pub mod session;

pub use catalog::TaskCatalog;
pub use compare::{Comparison, Mismatch, compare_tables};
pub use config::{GeneratorConfig, SessionOptions};
pub use generator::{DatasetGenerator, GenerationSummary, persist_dataset};
pub use grader::{
    Candidate, FixtureOutcome, FunctionGrader, GradeReport, QueryGrader, Substitution,
    grade_function, grade_query,
};
pub use orders::{SpendVerdict, check_cumulative_spend, seed_orders_fixture};
pub use records::{CompletionRecord, SkipSummary, Task};
pub use reference::{compute_reference_answer, reference_solution};
pub use session::GradingSession;
