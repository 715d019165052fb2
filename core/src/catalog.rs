//! The task catalog: pools of name fragments used to invent task names.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use std::path::Path;
use taskgrade_common::{CommonError, ErrorContext, Result};

/// Default location of the catalog resource, relative to the repository root.
pub const DEFAULT_CATALOG_PATH: &str = "data/task_names.json";

/// Separator between the fragments of a task name.
pub const FRAGMENT_SEPARATOR: &str = "-";

/// A list of categories, each an ordered list of name fragments.
///
/// The JSON form is a bare array of string arrays:
/// `[["load", "data"], ["train", "model"]]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TaskCatalog {
    categories: Vec<Vec<String>>,
}

impl TaskCatalog {
    /// Build a catalog, rejecting empty catalogs and empty categories.
    pub fn new(categories: Vec<Vec<String>>) -> Result<Self> {
        let catalog = Self { categories };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load the catalog resource from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_config_context(|| format!("Cannot read task catalog {}", path.display()))?;
        Self::from_json_str(&json)
            .map_err(|e| CommonError::configuration_error_with_source(path.display().to_string(), e))
    }

    /// Parse a catalog from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json).with_config_context(|| {
            "Task catalog must be an array of arrays of strings".to_string()
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(CommonError::configuration_error("Task catalog is empty"));
        }
        if let Some(index) = self.categories.iter().position(|c| c.is_empty()) {
            return Err(CommonError::configuration_error(format!(
                "Task catalog category {index} has no fragments"
            )));
        }
        Ok(())
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Pick one category uniformly and join its fragments.
    pub fn sample_name<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.categories
            .choose(rng)
            .map(|fragments| fragments.join(FRAGMENT_SEPARATOR))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_parse_catalog() {
        let catalog =
            TaskCatalog::from_json_str(r#"[["load", "data"], ["train", "model", "v2"]]"#).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.categories()[1], vec!["train", "model", "v2"]);
    }

    #[test]
    fn test_malformed_catalog_is_configuration_error() {
        for json in [r#"{"a": 1}"#, r#"[["ok"], [3]]"#, "not json", "[]", r#"[["a"], []]"#] {
            let err = TaskCatalog::from_json_str(json).unwrap_err();
            assert!(
                matches!(err, CommonError::ConfigurationError { .. }),
                "{json} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = TaskCatalog::load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, CommonError::ConfigurationError { .. }));
    }

    #[test]
    fn test_sample_name_joins_fragments() {
        let catalog = TaskCatalog::new(vec![vec!["clean".into(), "rows".into()]]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(catalog.sample_name(&mut rng), "clean-rows");
    }
}
