//! Generator and session configuration.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use taskgrade_common::storage::validate_table_name;
use taskgrade_common::{CommonError, ErrorContext, Result};

/// Default location of the fixture store, relative to the repository root.
pub const DEFAULT_STORE_PATH: &str = "data/tests";

/// Settings for the fixture generator.
///
/// Every field has a default, so a JSON file only needs the fields it
/// changes: `{"seed": 42, "task_count": {"start": 20, "end": 40}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Half-open range the task-sequence length is drawn from.
    pub task_count: Range<usize>,
    /// Upper bound of the people count as a fraction of the task count.
    pub people_fraction: f64,
    /// Lower bound of the people count.
    pub min_people: usize,
    /// Probability that a single task was completed.
    pub completion_probability: f64,
    /// Dataset tables are named `<prefix><index>`.
    pub dataset_prefix: String,
    /// Seed for the sampler; drawn from the OS when unset.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            task_count: 20..100,
            people_fraction: 0.25,
            min_people: 2,
            completion_probability: 0.9,
            dataset_prefix: "dataset_".to_string(),
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Read a configuration file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_config_context(|| format!("Cannot read generator config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_config_context(|| format!("Malformed generator config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_task_count(mut self, task_count: Range<usize>) -> Self {
        self.task_count = task_count;
        self
    }

    pub fn with_people_fraction(mut self, fraction: f64) -> Self {
        self.people_fraction = fraction;
        self
    }

    pub fn with_min_people(mut self, min_people: usize) -> Self {
        self.min_people = min_people;
        self
    }

    pub fn with_completion_probability(mut self, probability: f64) -> Self {
        self.completion_probability = probability;
        self
    }

    pub fn with_dataset_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.dataset_prefix = prefix.into();
        self
    }

    /// Check every setting before any sampling happens.
    pub fn validate(&self) -> Result<()> {
        if self.task_count.is_empty() || self.task_count.start == 0 {
            return Err(CommonError::configuration_error(format!(
                "task_count must be a non-empty range of positive lengths, got {:?}",
                self.task_count
            )));
        }
        if self.min_people == 0 {
            return Err(CommonError::configuration_error(
                "min_people must be at least 1",
            ));
        }
        if !(self.people_fraction > 0.0 && self.people_fraction <= 1.0) {
            return Err(CommonError::configuration_error(format!(
                "people_fraction must be in (0, 1], got {}",
                self.people_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.completion_probability) {
            return Err(CommonError::configuration_error(format!(
                "completion_probability must be in [0, 1], got {}",
                self.completion_probability
            )));
        }
        validate_table_name(&format!("{}0", self.dataset_prefix)).map_err(|e| {
            CommonError::configuration_error_with_source(
                format!("dataset_prefix {:?} is not a usable table name", self.dataset_prefix),
                e,
            )
        })?;
        Ok(())
    }
}

/// Settings for the SQL session used to run candidate queries.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub batch_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { batch_size: 8192 }
    }
}
