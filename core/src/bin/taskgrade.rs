//! Command-line entry point: generate fixtures and grade submissions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use taskgrade_common::{CommonError, Diagnose, ErrorContext, Result, TableStore, TableStoreBuilder};
use taskgrade_core::catalog::DEFAULT_CATALOG_PATH;
use taskgrade_core::config::DEFAULT_STORE_PATH;
use taskgrade_core::{
    DatasetGenerator, FunctionGrader, GeneratorConfig, QueryGrader, SessionOptions, Substitution,
    TaskCatalog, check_cumulative_spend, reference_solution, seed_orders_fixture,
};
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "taskgrade", version, about = "Generate SQL exercise fixtures and grade submissions")]
struct Args {
    /// Directory holding the fixture tables
    #[arg(short, long, default_value = DEFAULT_STORE_PATH, global = true)]
    store: PathBuf,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate task-completion datasets and their answer tables
    Generate {
        /// Number of datasets to write
        #[arg(short, long, default_value_t = 10)]
        count: usize,
        /// Seed for reproducible fixtures
        #[arg(long)]
        seed: Option<u64>,
        /// Task catalog resource
        #[arg(long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,
        /// Generator settings as JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the orders / customer_activity pair
    SeedOrders {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 10)]
        customers: usize,
        #[arg(long, default_value_t = 100)]
        orders: usize,
    },
    /// Grade a query that reads from `tasks`
    GradeQuery {
        /// SQL query text
        query: Option<String>,
        /// Read the query from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Binding::View)]
        binding: Binding,
    },
    /// Grade the built-in reference solution against every fixture
    GradeReference,
    /// Check a cumulative-spend query against the orders tables
    CheckSpend {
        query: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Binding {
    View,
    Rewrite,
}

impl From<Binding> for Substitution {
    fn from(binding: Binding) -> Self {
        match binding {
            Binding::View => Substitution::View,
            Binding::Rewrite => Substitution::Rewrite,
        }
    }
}

fn read_query(query: Option<String>, file: Option<&Path>) -> Result<String> {
    match (query, file) {
        (Some(query), None) => Ok(query),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_io_context(|| format!("Cannot read query file {}", path.display())),
        _ => Err(CommonError::configuration_error(
            "Pass the query either inline or with --file, not both",
        )),
    }
}

async fn run(args: Args) -> Result<bool> {
    let store = TableStoreBuilder::new()
        .local(args.store.display().to_string())
        .build()
        .await?;

    let outcome = execute(args.command, store.as_ref()).await;
    let stats = store.stats().await;
    info!(
        reads = stats.read_count,
        writes = stats.write_count,
        errors = stats.error_count,
        "store statistics"
    );
    store.close().await?;
    outcome
}

async fn execute(command: Command, store: &dyn TableStore) -> Result<bool> {
    match command {
        Command::Generate {
            count,
            seed,
            catalog,
            config,
        } => {
            let mut config = match config {
                Some(path) => GeneratorConfig::from_json_file(path)?,
                None => GeneratorConfig::default(),
            };
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            let catalog = TaskCatalog::load(catalog)?;
            let summary = DatasetGenerator::new(catalog, config)?
                .run(store, count)
                .await?;
            println!(
                "Generated {} datasets (seed {}).",
                summary.datasets.len(),
                summary.seed
            );
            Ok(true)
        }
        Command::SeedOrders {
            seed,
            customers,
            orders,
        } => {
            seed_orders_fixture(store, seed, customers, orders).await?;
            Ok(true)
        }
        Command::GradeQuery {
            query,
            file,
            binding,
        } => {
            let query = read_query(query, file.as_deref())?;
            let report = QueryGrader::new(store, SessionOptions::default())
                .with_substitution(binding.into())
                .grade(&query)
                .await?;
            for failure in report.failures() {
                println!("{}: {}", failure.dataset, failure.outcome);
            }
            report.print_summary();
            Ok(report.all_passed())
        }
        Command::GradeReference => {
            let report = FunctionGrader::new(store).grade(&reference_solution).await?;
            report.print_summary();
            Ok(report.all_passed())
        }
        Command::CheckSpend { query, file } => {
            let query = read_query(query, file.as_deref())?;
            let verdict =
                check_cumulative_spend(store, &SessionOptions::default(), &query).await?;
            verdict.print();
            Ok(verdict.is_correct())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(source) = std::error::Error::source(&e) {
                eprintln!("Caused by: {source}");
            }
            for suggestion in e.suggestions() {
                warn!("{suggestion}");
            }
            ExitCode::from(2)
        }
    }
}
