//! Grader - committee essay grading CLI
//!
//! The `grader` command submits essays, reports their status and runs the
//! grading worker.
//!
//! ## Commands
//!
//! - `submit`: Store an essay as a pending grading job
//! - `status`: Show a submission's status and final result
//! - `worker`: Recover unfinished jobs and process the queue
//! - `grade`: Grade one essay in-process, without the record store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use grading_core::{
    Committee, Essay, GeminiEvaluator, GradingConfig, GradingService, JobMachine, JobQueue,
    MemoryJobQueue, SubmissionId, SubmissionStore, SurrealSubmissionStore, Worker,
};

#[derive(Parser)]
#[command(name = "grader")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Committee grading of essays against a five-competency rubric", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file (environment variables still override it)
    #[arg(long, global = true, env = "GRADER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an essay and queue it for grading
    Submit {
        /// Essay topic
        #[arg(short, long)]
        topic: String,

        /// Path to the essay text
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show a submission's status, result or error as JSON
    Status {
        /// Submission ID returned by `submit`
        id: String,
    },

    /// Recover unfinished jobs and process the queue
    Worker {
        /// Exit once no ticket is pending and no job is running
        #[arg(long)]
        drain: bool,
    },

    /// Grade one essay in-process and print the consolidated result
    Grade {
        /// Essay topic
        #[arg(short, long)]
        topic: String,

        /// Path to the essay text
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    grading_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Submit { topic, file } => cmd_submit(&topic, &file).await,
        Commands::Status { id } => cmd_status(&id).await,
        Commands::Worker { drain } => cmd_worker(config, drain).await,
        Commands::Grade { topic, file } => cmd_grade(config, &topic, &file).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<GradingConfig> {
    let Some(path) = path else {
        return GradingConfig::from_env().context("Invalid configuration in environment");
    };
    let mut config = GradingConfig::from_toml_file(path)
        .with_context(|| format!("Failed to load config file {}", path.display()))?;
    config
        .apply_env_from(|key| std::env::var(key).ok())
        .context("Invalid configuration in environment")?;
    Ok(config)
}

async fn open_store() -> Result<Arc<dyn SubmissionStore>> {
    let store = SurrealSubmissionStore::from_env()
        .await
        .context("Failed to connect to grading database")?;
    Ok(Arc::new(store))
}

fn read_essay(file: &Path) -> Result<String> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read essay from {}", file.display()))?;
    anyhow::ensure!(!text.trim().is_empty(), "Essay file {} is empty", file.display());
    Ok(text)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn committee(config: &GradingConfig) -> Result<Committee> {
    let evaluator =
        GeminiEvaluator::new(config.evaluator.clone()).context("Failed to create evaluator")?;
    Ok(Committee::new(Arc::new(evaluator)))
}

/// Store the essay as PENDING; a running or future worker picks it up.
async fn cmd_submit(topic: &str, file: &Path) -> Result<()> {
    let text = read_essay(file)?;
    let store = open_store().await?;
    // Tickets for this process's queue are never consumed here; workers
    // recover PENDING records on startup.
    let service = GradingService::new(store, Arc::new(MemoryJobQueue::new()));

    let id = service
        .submit(topic, &text)
        .await
        .context("Failed to store submission")?;
    println!("{id}");
    Ok(())
}

async fn cmd_status(id: &str) -> Result<()> {
    let store = open_store().await?;
    let view = store
        .get_status(&SubmissionId::from(id))
        .await
        .with_context(|| format!("No status for submission {id}"))?;
    print_json(&view)
}

async fn cmd_worker(config: GradingConfig, drain: bool) -> Result<()> {
    let store = open_store().await?;
    let machine = JobMachine::new(store, committee(&config)?, config.job.clone());
    let queue = Arc::new(MemoryJobQueue::new());
    let worker = Worker::new(Arc::new(machine), queue.clone(), config.worker.clone());

    let recovered = worker
        .recover()
        .await
        .context("Failed to recover unfinished jobs")?;
    info!(recovered, drain, "worker starting");

    if !drain {
        let queue = queue.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing running jobs");
                queue.close();
            }
        });
    }

    let stats = worker.run(drain).await;
    print_json(&stats)
}

async fn cmd_grade(config: GradingConfig, topic: &str, file: &Path) -> Result<()> {
    let essay = Essay::new(topic, read_essay(file)?);
    let result = committee(&config)?
        .grade(&essay)
        .await
        .context("Grading stopped by the evaluator's rate limit")?;
    print_json(&result)
}
