//! Entry point for Flowly's scheduled background jobs.

use anyhow::Context;
use clap::Parser;
use db::{DBService, models::recurrence_run::RecurrenceRun};
use services::services::recurrence::RecurrenceService;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Roll completed recurring tasks in the shared task store into their next
/// occurrence. Meant to be invoked periodically by an external scheduler,
/// which is also responsible for not overlapping invocations.
#[derive(Debug, Parser)]
#[command(name = "flowly-jobs", version, about)]
struct Cli {
    /// Connection string for the task store, e.g. `sqlite://flowly.db`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Print the most recently recorded run instead of processing.
    #[arg(long)]
    last_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db = DBService::new(&cli.database_url)
        .await
        .context("failed to open task store")?;

    let outcome = if cli.last_run {
        show_last_run(&db).await
    } else {
        process_recurring_tasks(&db).await
    };

    // Close the pool even when the sweep failed.
    db.pool.close().await;
    outcome
}

async fn process_recurring_tasks(db: &DBService) -> anyhow::Result<()> {
    let summary = RecurrenceService::new(db.clone())
        .run()
        .await
        .context("recurrence sweep aborted")?;
    info!("{}", summary.summary());
    Ok(())
}

async fn show_last_run(db: &DBService) -> anyhow::Result<()> {
    match RecurrenceRun::find_latest(&db.pool).await? {
        Some(run) => println!(
            "last run finished {}: scanned {}, created {}, errors {}",
            run.finished_at, run.scanned, run.created, run.errors
        ),
        None => println!("no recorded runs"),
    }
    Ok(())
}
