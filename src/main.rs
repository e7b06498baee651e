use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use esinti::config::Config;
use esinti::models::{Event, Notification, WorkerIdentity};
use esinti::scheduler::{Action, Dispatcher, EventLedger, Planner, WorkerPool};

#[derive(Parser)]
#[command(
    name = "esinti",
    version,
    about = "Human-paced fan-out scheduler for deferred worker actions",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "esinti.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview the schedule plan for one event without executing anything
    Plan {
        /// Subject the event occurred on
        #[arg(short, long)]
        subject: String,

        /// Item identifier
        #[arg(short, long)]
        item: String,

        /// Seed for a reproducible preview
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Schedule synthetic events against a logging stub action
    Simulate {
        /// Events to schedule, as subject:item pairs
        #[arg(required = true)]
        events: Vec<String>,

        /// Seconds to let deferred tasks fire before shutting down
        #[arg(long, default_value = "30")]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = Config::from_file(&cli.config)?;
    tracing::info!(
        workers = config.workers.len(),
        groups = config.groups.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Plan { subject, item, seed } => {
            plan_preview(&config, &subject, &item, seed)?;
        }
        Commands::Simulate { events, wait_secs } => {
            simulate(&config, events, wait_secs).await?;
        }
    }

    Ok(())
}

/// Dry-run: print the plan one event would produce
fn plan_preview(config: &Config, subject: &str, item: &str, seed: Option<u64>) -> Result<()> {
    let pool = WorkerPool::build(config.worker_identities(), config.group_models())?;
    let planner = Planner::new(config.exclusion, config.distribution.clone());

    let event = Event::new(subject, item);
    let Some(group) = pool.resolve_subject(subject) else {
        println!("Subject '{subject}' belongs to no configured group; nothing to schedule.");
        return Ok(());
    };

    let candidates = pool.members_of(group);
    let now = chrono::Utc::now();

    let plan = match seed {
        Some(seed) => planner.plan(&candidates, now, &mut ChaCha8Rng::seed_from_u64(seed)),
        None => planner.plan(&candidates, now, &mut rand::thread_rng()),
    };

    println!("Event: {event} (group '{}')", group.name);
    print!("{}", plan.summary());
    Ok(())
}

/// Stub action that only logs; stands in for the external collaborator
struct LoggingAction;

#[async_trait::async_trait]
impl Action for LoggingAction {
    async fn perform(&self, worker: &WorkerIdentity, event: &Event) -> Result<()> {
        tracing::info!(worker = %worker, event = %event, "Stub action performed");
        Ok(())
    }
}

/// Run synthetic notifications through a real dispatcher
async fn simulate(config: &Config, events: Vec<String>, wait_secs: u64) -> Result<()> {
    let pool = WorkerPool::build(config.worker_identities(), config.group_models())?;
    let planner = Planner::new(config.exclusion, config.distribution.clone());
    let ledger = EventLedger::with_retention(chrono::Duration::hours(config.ledger.retention_hours));

    let dispatcher = Dispatcher::new(pool, planner, ledger, config.settle, Arc::new(LoggingAction));

    for entry in events {
        let Some((subject, item)) = entry.split_once(':') else {
            anyhow::bail!("event '{entry}' is not a subject:item pair");
        };
        let disposition = dispatcher
            .schedule(Notification::viewable(subject, item))
            .await?;
        println!("{subject}:{item} -> {disposition:?}");
    }

    tracing::info!(wait_secs, "Waiting for early tasks to fire");
    tokio::time::sleep(std::time::Duration::from_secs(wait_secs)).await;

    dispatcher.shutdown();
    // Give abandonment a moment to settle before reading counters
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let stats = dispatcher.stats().await;
    println!(
        "admitted: {} | scheduled: {} | succeeded: {} | failed: {} | abandoned: {}",
        stats.events_admitted,
        stats.tasks_scheduled,
        stats.tasks_succeeded,
        stats.tasks_failed,
        stats.tasks_abandoned
    );

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("esinti=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("esinti=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
