//! Repository Backup - Main entry point

use anyhow::Result;
use clap::Parser;
use repo_backup::daemon::shutdown::ShutdownCoordinator;
use repo_backup::services::coordinator::{BackupRunner, RunSummary};
use repo_backup::services::scheduler::BackupScheduler;
use repo_backup::{utils, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run a single backup pass even if a schedule is configured
    #[arg(long)]
    once: bool,

    /// Root backup directory (overrides BACKUP_DIR)
    #[arg(short, long, value_name = "DIR")]
    backup_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let log_level = args
        .log_level
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    utils::logger::init(&log_level)?;

    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    if let Some(dir) = args.backup_dir {
        config.backup_dir = dir;
    }

    tracing::info!(
        "Starting repo-backup v{} (backup_dir: {})",
        env!("CARGO_PKG_VERSION"),
        config.backup_dir.display()
    );

    // Signals stop the run after the repository in flight
    let shutdown = Arc::new(ShutdownCoordinator::new(CancellationToken::new()));
    let runner = Arc::new(BackupRunner::new(&config, shutdown.token())?);
    let signal_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.wait_for_signal().await })
    };

    let schedule = config.schedule.clone().filter(|_| !args.once);
    let scheduler = match &schedule {
        Some(expression) => {
            let scheduler = BackupScheduler::new(runner.clone()).await?;
            scheduler.schedule(expression).await?;
            scheduler.start().await?;
            tracing::info!(schedule = %expression, "Scheduled backup");
            Some(scheduler)
        }
        None => None,
    };

    tracing::info!("Running backup once on start");
    let summary = runner.run_once().await;
    let startup_ok = startup_succeeded(summary.as_ref(), scheduler.is_some());

    let Some(scheduler) = scheduler else {
        return Ok(exit_code(startup_ok));
    };

    // Wait for shutdown signal
    let _ = signal_handle.await;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown error: {}", e);
    }
    tracing::info!("Stopped");

    Ok(exit_code(startup_ok))
}

/// Report the startup run. A skipped run (another run holds the guard) counts
/// as a failure.
fn startup_succeeded(summary: Option<&RunSummary>, scheduled: bool) -> bool {
    let Some(summary) = summary else {
        tracing::warn!("Startup backup run did not execute");
        return false;
    };
    if summary.is_success() {
        return true;
    }

    if scheduled {
        tracing::warn!(
            run_id = %summary.run_id,
            failed = summary.failed.len(),
            discovery_failed = summary.discovery_failed,
            "Startup backup run failed, continuing on schedule"
        );
    } else {
        tracing::error!(
            run_id = %summary.run_id,
            failed = summary.failed.len(),
            discovery_failed = summary.discovery_failed,
            "Backup run failed"
        );
    }
    false
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
