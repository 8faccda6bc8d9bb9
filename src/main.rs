use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use crucible::config::Config;
use crucible::dispatch::CapabilityDispatcher;
use crucible::dispatch::client::HttpModelClient;
use crucible::engine::{ConsoleGate, Phase, StateStore, WorkflowEngine};
use crucible::ledger::InteractionLedger;
use crucible::workers::WorkerSet;

#[derive(Parser)]
#[command(name = "crucible")]
#[command(version, about = "Agent-team workflow orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the workflow for a goal, resuming any checkpointed run
    Run {
        /// The high-level goal to build toward
        goal: String,

        /// Discard any existing checkpoint and start over
        #[arg(long)]
        fresh: bool,
    },
    /// Show the checkpointed phase and which artifacts exist
    Status,
    /// Delete the workflow checkpoint
    Reset {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run { goal, fresh } => cmd_run(project_dir, &cli, goal, *fresh).await?,
        Commands::Status => cmd_status(project_dir, &cli)?,
        Commands::Reset { force } => cmd_reset(project_dir, &cli, *force)?,
    }

    Ok(())
}

async fn cmd_run(project_dir: PathBuf, cli: &Cli, goal: &str, fresh: bool) -> Result<()> {
    let config = Arc::new(Config::load(project_dir, cli.verbose)?);
    config.ensure_directories()?;

    if fresh {
        StateStore::new(config.state_file.clone()).reset()?;
    }

    let ledger = Arc::new(InteractionLedger::new(config.ledger_dir.clone()));
    let client = Arc::new(HttpModelClient::new());
    let dispatcher = Arc::new(CapabilityDispatcher::new(
        Arc::clone(&config),
        Arc::clone(&ledger),
        client,
    ));
    let workers = WorkerSet::new(&config, Arc::clone(&dispatcher), ledger);

    let mut engine = WorkflowEngine::new(&config, dispatcher, workers, Box::new(ConsoleGate))?;
    engine.run(goal).await?;

    let state = engine.state();
    println!();
    println!("{}", style("Workflow complete.").green().bold());
    if let Some(code) = &state.artifacts.fixed_code {
        println!();
        println!("{}", style("── Final Code ──").cyan().bold());
        println!("{code}");
    }
    if let Some(docs) = &state.artifacts.documentation {
        println!();
        println!("{}", style("── Documentation ──").cyan().bold());
        println!("{docs}");
    }
    println!();
    println!(
        "Interaction history: {}",
        style(config.ledger_dir.display()).dim()
    );
    Ok(())
}

fn cmd_status(project_dir: PathBuf, cli: &Cli) -> Result<()> {
    let config = Config::load(project_dir, cli.verbose)?;
    let state = StateStore::new(config.state_file).load()?;

    if state.phase == Phase::Idle {
        println!("No run in progress.");
        return Ok(());
    }

    println!("Goal:  {}", state.goal);
    println!("Phase: {}", style(state.phase).cyan().bold());

    let artifacts = &state.artifacts;
    let slots: [(&str, bool); 6] = [
        ("full plan", artifacts.full_plan.is_some()),
        ("generated code", artifacts.generated_code.is_some()),
        ("review feedback", artifacts.qa_feedback.is_some()),
        ("fixed code", artifacts.fixed_code.is_some()),
        ("verification report", artifacts.qa_verification.is_some()),
        ("documentation", artifacts.documentation.is_some()),
    ];
    for (name, present) in slots {
        let mark = if present {
            style("✓").green()
        } else {
            style("·").dim()
        };
        println!("  {mark} {name}");
    }
    if !state.pending_feedback.is_empty() {
        println!("Pending feedback entries: {}", state.pending_feedback.len());
    }
    Ok(())
}

fn cmd_reset(project_dir: PathBuf, cli: &Cli, force: bool) -> Result<()> {
    let config = Config::load(project_dir, cli.verbose)?;
    let store = StateStore::new(config.state_file);

    if !force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Delete the workflow checkpoint? All progress will be lost")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    store.reset()?;
    println!("{}", style("Checkpoint removed.").green());
    Ok(())
}
