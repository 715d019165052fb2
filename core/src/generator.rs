//! Synthetic task-completion fixtures.
//!
//! A fixture is a raw dataset table (people × tasks with a completion flag)
//! plus its reference answer. The generator samples fixtures from a seeded
//! ChaCha stream, so a run can be replayed exactly from the seed it logs.

use crate::catalog::TaskCatalog;
use crate::columnar::ToRecordBatch;
use crate::config::GeneratorConfig;
use crate::records::{CompletionRecord, SkipSummary, Task, answer_table_name};
use crate::reference::compute_reference_answer;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use taskgrade_common::{Result, TableStore};
use tracing::{debug, info};

/// Label of the `index`-th person: `Person A` .. `Person Z`, then
/// `Person AA`, `Person AB`, ... like spreadsheet columns.
pub fn person_label(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("Person {}", letters.into_iter().collect::<String>())
}

/// One sampled fixture, not yet persisted.
#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub tasks: Vec<Task>,
    pub people: Vec<String>,
    pub records: Vec<CompletionRecord>,
    pub answer: Vec<SkipSummary>,
}

/// What a run wrote, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub name: String,
    pub tasks: usize,
    pub people: usize,
    pub rows: usize,
    pub skipped_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub seed: u64,
    pub datasets: Vec<DatasetSummary>,
}

/// Samples fixtures from a task catalog.
#[derive(Debug)]
pub struct DatasetGenerator {
    catalog: TaskCatalog,
    config: GeneratorConfig,
    rng: ChaCha8Rng,
    seed: u64,
}

impl DatasetGenerator {
    /// Create a generator. Uses `config.seed` or draws and logs a fresh one.
    pub fn new(catalog: TaskCatalog, config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        info!(seed, "seeded fixture generator");

        Ok(Self {
            catalog,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        })
    }

    /// The seed this generator's stream started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Sample a task sequence; names may repeat.
    pub fn generate_tasks(&mut self) -> Vec<Task> {
        let length = self.rng.random_range(self.config.task_count.clone());
        (0..length)
            .map(|position| Task {
                name: self.catalog.sample_name(&mut self.rng),
                ordinality: position as i64,
            })
            .collect()
    }

    /// Sample the people working through `tasks`.
    pub fn generate_people(&mut self, tasks: &[Task]) -> Vec<String> {
        let min_people = self.config.min_people;
        let bound = (tasks.len() as f64 * self.config.people_fraction).floor() as usize;
        let upper = bound.max(min_people);

        let count = if upper > min_people {
            self.rng.random_range(min_people..upper)
        } else {
            min_people
        };
        (0..count).map(person_label).collect()
    }

    /// Every person × task row, ordered by person then ordinality.
    pub fn build_dataset(&mut self, tasks: &[Task], people: &[String]) -> Vec<CompletionRecord> {
        let mut people: Vec<&String> = people.iter().collect();
        people.sort();

        let mut tasks: Vec<&Task> = tasks.iter().collect();
        tasks.sort_by_key(|task| task.ordinality);

        let probability = self.config.completion_probability;
        let mut records = Vec::with_capacity(people.len() * tasks.len());
        for person in people {
            for task in &tasks {
                let completed = self.rng.random_bool(probability);
                records.push(CompletionRecord::new(person, task, completed));
            }
        }
        records
    }

    /// Sample one complete fixture.
    pub fn generate(&mut self) -> GeneratedDataset {
        let tasks = self.generate_tasks();
        let people = self.generate_people(&tasks);
        let records = self.build_dataset(&tasks, &people);
        let answer = compute_reference_answer(&records);

        GeneratedDataset {
            tasks,
            people,
            records,
            answer,
        }
    }

    /// Generate and persist `count` fixtures named `<prefix>0 .. <prefix>{count-1}`.
    pub async fn run(&mut self, store: &dyn TableStore, count: usize) -> Result<GenerationSummary> {
        let mut datasets = Vec::with_capacity(count);

        for index in 0..count {
            let name = format!("{}{}", self.config.dataset_prefix, index);
            let dataset = self.generate();
            persist_dataset(store, &name, &dataset.records, &dataset.answer).await?;

            let summary = DatasetSummary {
                name,
                tasks: dataset.tasks.len(),
                people: dataset.people.len(),
                rows: dataset.records.len(),
                skipped_total: dataset.answer.iter().map(|a| a.skipped).sum(),
            };
            info!(
                progress = %format!("{}/{}", index + 1, count),
                dataset = %summary.name,
                tasks = summary.tasks,
                people = summary.people,
                "generated dataset"
            );
            datasets.push(summary);
        }

        Ok(GenerationSummary {
            seed: self.seed,
            datasets,
        })
    }
}

/// Write a raw table and its answer table, replacing earlier versions.
pub async fn persist_dataset(
    store: &dyn TableStore,
    name: &str,
    records: &[CompletionRecord],
    answer: &[SkipSummary],
) -> Result<()> {
    let raw = CompletionRecord::to_record_batch(records)?;
    let solution = SkipSummary::to_record_batch(answer)?;

    store.write_table(name, &raw).await?;
    store.write_table(&answer_table_name(name), &solution).await?;
    debug!(dataset = name, rows = raw.num_rows(), "persisted fixture");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn catalog() -> TaskCatalog {
        TaskCatalog::new(vec![
            vec!["load".into(), "data".into()],
            vec!["clean".into(), "rows".into()],
            vec!["train".into(), "model".into()],
        ])
        .unwrap()
    }

    fn generator(config: GeneratorConfig) -> DatasetGenerator {
        DatasetGenerator::new(catalog(), config).unwrap()
    }

    #[test]
    fn test_person_labels() {
        assert_eq!(person_label(0), "Person A");
        assert_eq!(person_label(25), "Person Z");
        assert_eq!(person_label(26), "Person AA");
        assert_eq!(person_label(27), "Person AB");
        assert_eq!(person_label(26 + 26 * 26), "Person AAA");
    }

    #[test]
    fn test_task_sequence_bounds() {
        let mut generator = generator(GeneratorConfig::default().with_seed(1));
        for _ in 0..50 {
            let tasks = generator.generate_tasks();
            assert!((20..100).contains(&tasks.len()));
            for (position, task) in tasks.iter().enumerate() {
                assert_eq!(task.ordinality, position as i64);
                assert!(["load-data", "clean-rows", "train-model"].contains(&task.name.as_str()));
            }
        }
    }

    #[test]
    fn test_people_count_bounds() {
        let mut generator = generator(GeneratorConfig::default().with_seed(2));
        for _ in 0..50 {
            let tasks = generator.generate_tasks();
            let people = generator.generate_people(&tasks);
            let upper = (tasks.len() / 4).max(2);
            assert!(people.len() >= 2);
            assert!(people.len() < upper || people.len() == 2);
        }
    }

    #[test]
    fn test_minimum_bounds_generate() {
        let config = GeneratorConfig::default()
            .with_seed(3)
            .with_task_count(20..21);
        let mut generator = generator(config);

        let tasks = generator.generate_tasks();
        assert_eq!(tasks.len(), 20);
        let people = vec![person_label(0), person_label(1)];
        let records = generator.build_dataset(&tasks, &people);
        assert_eq!(records.len(), 40);
    }

    #[test]
    fn test_short_sequences_fall_back_to_min_people() {
        let config = GeneratorConfig::default()
            .with_seed(4)
            .with_task_count(1..8);
        let mut generator = generator(config);
        let tasks = generator.generate_tasks();
        assert_eq!(generator.generate_people(&tasks).len(), 2);
    }

    #[test]
    fn test_many_people_get_multi_letter_labels() {
        let config = GeneratorConfig::default()
            .with_seed(5)
            .with_task_count(400..401)
            .with_people_fraction(1.0)
            .with_min_people(30);
        let mut generator = generator(config);
        let tasks = generator.generate_tasks();
        let people = generator.generate_people(&tasks);

        assert!(people.len() >= 30);
        let unique: BTreeSet<&String> = people.iter().collect();
        assert_eq!(unique.len(), people.len());
        assert!(people.contains(&"Person AA".to_string()));
    }

    #[test]
    fn test_dataset_rows_ordered_by_person_then_ordinality() {
        let mut generator = generator(GeneratorConfig::default().with_seed(6));
        let dataset = generator.generate();

        assert_eq!(
            dataset.records.len(),
            dataset.people.len() * dataset.tasks.len()
        );
        let keys: Vec<(&str, i64)> = dataset
            .records
            .iter()
            .map(|r| (r.person.as_str(), r.ordinality))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_answer_has_one_bounded_row_per_person() {
        let mut generator = generator(GeneratorConfig::default().with_seed(7));
        for _ in 0..20 {
            let dataset = generator.generate();
            assert_eq!(dataset.answer.len(), dataset.people.len());
            for row in &dataset.answer {
                assert!(row.skipped >= 0);
                assert!(row.skipped <= dataset.tasks.len() as i64);
            }
        }
    }

    #[test]
    fn test_completion_probability_extremes() {
        let mut all_done = generator(
            GeneratorConfig::default()
                .with_seed(8)
                .with_completion_probability(1.0),
        );
        let dataset = all_done.generate();
        assert!(dataset.records.iter().all(|r| r.completed));
        assert!(dataset.answer.iter().all(|a| a.skipped == 0));

        let mut none_done = generator(
            GeneratorConfig::default()
                .with_seed(8)
                .with_completion_probability(0.0),
        );
        let dataset = none_done.generate();
        assert!(dataset.answer.iter().all(|a| a.skipped == 0));
    }

    #[test]
    fn test_same_seed_same_fixtures() {
        let mut a = generator(GeneratorConfig::default().with_seed(99));
        let mut b = generator(GeneratorConfig::default().with_seed(99));
        for _ in 0..3 {
            assert_eq!(a.generate().records, b.generate().records);
        }
    }

    #[test]
    fn test_unseeded_generator_reports_its_seed() {
        let generator = generator(GeneratorConfig::default());
        let mut replay = DatasetGenerator::new(
            catalog(),
            GeneratorConfig::default().with_seed(generator.seed()),
        )
        .unwrap();
        let mut original = generator;
        assert_eq!(original.generate().records, replay.generate().records);
    }
}
