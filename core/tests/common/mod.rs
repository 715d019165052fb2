//! Common test utilities and helpers for integration tests

use std::sync::Arc;
use taskgrade_common::{TableStore, TableStoreBuilder};
use taskgrade_core::{DatasetGenerator, GeneratorConfig, TaskCatalog};

/// A small catalog so task names are easy to recognise in failures
pub fn test_catalog() -> TaskCatalog {
    TaskCatalog::new(vec![
        vec!["load".to_string(), "data".to_string()],
        vec!["clean".to_string(), "rows".to_string()],
        vec!["train".to_string(), "model".to_string()],
    ])
    .unwrap()
}

/// Create an empty in-memory store
pub async fn memory_store() -> Arc<dyn TableStore> {
    TableStoreBuilder::new().build().await.unwrap()
}

/// Create a store holding `count` generated fixtures
#[allow(dead_code)] // Not every test binary grades fixtures
pub async fn store_with_fixtures(count: usize, seed: u64) -> Arc<dyn TableStore> {
    let store = memory_store().await;
    generate_into(store.as_ref(), count, seed).await;
    store
}

/// Generate `count` fixtures into an existing store
pub async fn generate_into(store: &dyn TableStore, count: usize, seed: u64) {
    let config = GeneratorConfig::default()
        .with_seed(seed)
        .with_task_count(20..40);
    DatasetGenerator::new(test_catalog(), config)
        .unwrap()
        .run(store, count)
        .await
        .unwrap();
}

/// The skipped-task analysis written as a learner would in SQL
#[allow(dead_code)]
pub const REFERENCE_QUERY: &str = "
    SELECT person, CAST(SUM(CASE WHEN NOT completed AND later_completions > 0 THEN 1 ELSE 0 END) AS BIGINT) AS skipped
    FROM (
        SELECT person, completed,
               SUM(CASE WHEN completed THEN 1 ELSE 0 END) OVER (
                   PARTITION BY person ORDER BY ordinality DESC
                   ROWS BETWEEN UNBOUNDED PRECEDING AND 1 PRECEDING
               ) AS later_completions
        FROM tasks
    ) scanned
    GROUP BY person
    ORDER BY person
";
