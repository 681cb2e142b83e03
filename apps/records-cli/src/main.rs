use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use records::{Dataset, MemoryStore, RecordsService};
use runtime::{AppConfig, CliArgs};
use serde::Serialize;
use spec_core::SpecParams;

/// Records CLI - run named query specifications over a JSON dataset
#[derive(Parser)]
#[command(name = "records-cli")]
#[command(about = "Records CLI - run named query specifications over a JSON dataset")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset file (overrides config)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named query and print the result as JSON
    Query {
        #[command(subcommand)]
        target: Target,
    },
    /// Check configuration and dataset
    Check,
}

#[derive(Subcommand)]
enum Target {
    /// Paged visits, e.g. "pageIndex=2&pageSize=3&sort=checkInAsc&search=delivery"
    Visits { query: Option<String> },
    /// Paged visitors with their visits; accepts childCount
    Visitors { query: Option<String> },
    /// Paged orders of one buyer
    Orders {
        #[arg(long)]
        buyer: String,
        query: Option<String>,
    },
    /// Most recent visits still checked in
    CheckedIn {
        #[arg(long, default_value_t = 5)]
        take: u64,
    },
    /// Single order by payment intent
    Order { payment_intent_id: String },
    /// Employees grouped by department
    Employees {
        #[arg(long)]
        department: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI args passed down to config
    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        data: cli.data.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::init_logging_from_config(&logging_config, &config.base_dir());
    tracing::info!("records-cli starting");

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Query { target } => run_query(&config, target).await,
        Commands::Check => check(&config).await,
    }
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;
    let dataset = Dataset::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    Ok(dataset)
}

fn open_service(config: &AppConfig) -> Result<RecordsService<MemoryStore>> {
    let path = config
        .dataset_path()
        .context("No dataset configured: pass --data or set data.dataset")?;
    tracing::info!(path = %path.display(), "loading dataset");

    let dataset = load_dataset(&path)?;
    Ok(RecordsService::new(MemoryStore::new(dataset), config.query))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_query(config: &AppConfig, target: Target) -> Result<()> {
    let service = open_service(config)?;
    let params = |q: Option<String>| -> Result<SpecParams> {
        let params = SpecParams::from_query_string(q.as_deref().unwrap_or_default(), config.query)?;
        Ok(params)
    };

    match target {
        Target::Visits { query } => print_json(&service.list_visits(&params(query)?).await?),
        Target::Visitors { query } => print_json(&service.list_visitors(&params(query)?).await?),
        Target::Orders { buyer, query } => {
            print_json(&service.orders_for_buyer(&buyer, &params(query)?).await?)
        }
        Target::CheckedIn { take } => print_json(&service.checked_in_visits(take).await?),
        Target::Order { payment_intent_id } => {
            print_json(&service.order_by_payment_intent(&payment_intent_id).await?)
        }
        Target::Employees { department } => {
            print_json(&service.employees_by_department(department.as_deref()).await?)
        }
    }
}

async fn check(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    if config.dataset_path().is_none() {
        println!("Configuration check passed (no dataset configured)");
        return Ok(());
    }

    let summary = open_service(config)?.summary().await?;
    println!("Configuration check passed");
    print_json(&summary)
}
