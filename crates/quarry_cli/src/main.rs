//! QUARRY CLI
//!
//! Operator interface: run candidate statements through the recovery
//! pipeline, check them against policy, inspect the dataset, and read the
//! failure log.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod render;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use quarry_core::QuarryConfig;
use quarry_engine::{DataFusionEngine, EngineAdapter, describe_columns};
use quarry_log::FailureLogReader;
use quarry_policy::{PolicyValidator, sanitize};
use quarry_runtime::{RecoveryOrchestrator, RecoveryOutcome};
use render::{MAX_DISPLAY_ROWS, format_table, status_line};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(about = "QUARRY - guarded SQL execution over the trade dataset", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Override the dataset CSV path
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,
    /// Override the permitted table name
    #[arg(long, global = true)]
    table: Option<String>,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a candidate statement through validation, execution and recovery
    Ask {
        /// Candidate SQL text, or `-` to read stdin
        #[arg(short, long)]
        sql: String,
        /// Original question, recorded with failures
        #[arg(short, long)]
        question: Option<String>,
        /// Apply the row limit before the first execution
        #[arg(long)]
        limit: bool,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a candidate against policy without executing it
    Validate {
        /// Candidate SQL text, or `-` to read stdin
        #[arg(short, long)]
        sql: String,
    },
    /// Describe the dataset columns
    Schema,
    /// Count dataset rows
    Count,
    /// Show recent failure log entries
    Failures {
        /// Number of entries
        #[arg(short, long, default_value_t = 10)]
        tail: usize,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quarry=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<QuarryConfig> {
    let mut config = match &cli.config {
        Some(path) => QuarryConfig::from_json_file(path)?,
        None => QuarryConfig::default(),
    };
    if let Some(dataset) = &cli.dataset {
        config = config.with_dataset_path(dataset.clone());
    }
    if let Some(table) = &cli.table {
        config = config.with_table_name(table.clone());
    }
    config.validate()?;
    Ok(config)
}

fn read_sql(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

async fn open_adapter(config: &QuarryConfig) -> Result<EngineAdapter> {
    let adapter = EngineAdapter::new(Arc::new(DataFusionEngine::from_config(config)));
    adapter.open().await?;
    Ok(adapter)
}

async fn ask(config: &QuarryConfig, sql: &str, question: Option<&str>, limit: bool, json: bool) -> Result<bool> {
    if let Some(parent) = config.failure_log_path.parent() {
        if config.log_failures && !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let adapter = open_adapter(config).await?;
    let orchestrator = RecoveryOrchestrator::from_config(adapter.clone(), config);
    let candidate = if limit {
        sanitize(sql, config.row_limit)
    } else {
        sql.to_string()
    };

    let outcome = orchestrator.run(&candidate, question).await;
    adapter.close().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(outcome.is_success());
    }

    match &outcome {
        RecoveryOutcome::Success(success) => {
            println!("{}", status_line(true, &success.message));
            println!("{}", console::style(&success.statement).dim());
            if !success.table.is_empty() {
                println!("{}", format_table(&success.table, MAX_DISPLAY_ROWS));
            }
        }
        RecoveryOutcome::Failed(failure) => {
            println!("{}", status_line(false, &failure.message));
            println!(
                "code: {}  actionable: {}",
                failure.kind.code(),
                failure.kind.is_actionable()
            );
            if let Some(statement) = &failure.trace.last_statement {
                println!("{}", console::style(statement).dim());
            }
        }
    }
    Ok(outcome.is_success())
}

fn validate(config: &QuarryConfig, sql: &str) -> bool {
    let screening = PolicyValidator::new(config.table_name.clone()).screen(sql);
    match screening.verdict.reason {
        None => println!("{}", status_line(true, "valid")),
        Some(reason) => println!(
            "{}",
            status_line(false, &format!("{}: {}", reason, reason.describe()))
        ),
    }
    if let Some(statement) = &screening.statement {
        println!("{}", statement);
    }
    screening.verdict.is_valid()
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    let config = load_config(&cli)?;

    let ok = match &cli.command {
        Commands::Ask {
            sql,
            question,
            limit,
            json,
        } => {
            let sql = read_sql(sql)?;
            ask(&config, &sql, question.as_deref(), *limit, *json).await?
        }
        Commands::Validate { sql } => validate(&config, &read_sql(sql)?),
        Commands::Schema => {
            let adapter = open_adapter(&config).await?;
            println!("{}", describe_columns(&adapter.schema().await?));
            adapter.close().await?;
            true
        }
        Commands::Count => {
            let adapter = open_adapter(&config).await?;
            println!("{}", adapter.row_count().await?);
            adapter.close().await?;
            true
        }
        Commands::Failures { tail } => {
            let log = FailureLogReader::new(config.failure_log_path.clone()).tail(*tail)?;
            for record in &log.records {
                println!(
                    "{}  {}\n  question: {}\n  sql: {}",
                    console::style(record.timestamp.to_rfc3339()).dim(),
                    record.error,
                    record.question,
                    record.sql
                );
            }
            if log.malformed > 0 {
                eprintln!("{} malformed lines skipped", log.malformed);
            }
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
