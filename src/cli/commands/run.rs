//! Replay command implementation.
//!
//! One pass reads `status.yaml`, replays every pending delta into Groonga
//! and advances the checkpoint after each target. `--watch` repeats the
//! pass every `polling_interval` seconds; Ctrl-C is only acted on between
//! passes so a pass always runs to completion or failure.

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{GroongaClient, Operation, RecordingStore};
use crate::sync::{
    Checkpoint, MemoryCheckpoint, ReplayDriver, ReplayStats, StatusFile, format_timestamp,
};

use super::runtime;

/// Outcome of one pass.
#[derive(Serialize)]
struct PassOutput {
    dry_run: bool,
    stats: ReplayStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    operations: Vec<OperationOutput>,
}

/// A store operation recorded during a dry run.
#[derive(Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
enum OperationOutput {
    ExecuteScript { path: String },
    Load { table: String, rows: usize },
}

impl From<Operation> for OperationOutput {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Script(path) => Self::ExecuteScript {
                path: path.display().to_string(),
            },
            Operation::Load { table, rows } => Self::Load { table, rows },
        }
    }
}

/// Execute the replay command.
pub fn execute(config: &Config, watch: bool, dry_run: bool, json: bool) -> Result<()> {
    let rt = runtime()?;
    if watch {
        rt.block_on(watch_passes(config, dry_run, json))
    } else {
        let output = rt.block_on(run_pass(config, dry_run))?;
        print_pass(&output, json)
    }
}

/// Run a single pass against Groonga, or against a recorder for `--dry-run`.
async fn run_pass(config: &Config, dry_run: bool) -> Result<PassOutput> {
    let mut driver = ReplayDriver::new(config.delta_dir());
    let status = StatusFile::in_dir(config.dir())?;
    let now = Utc::now();

    if dry_run {
        let store = RecordingStore::new();
        let mut checkpoint = MemoryCheckpoint::starting_at(status.last_applied());
        let stats = driver.run_pass(&store, &mut checkpoint, now).await?;
        Ok(PassOutput {
            dry_run,
            stats,
            operations: store.operations().into_iter().map(Into::into).collect(),
        })
    } else {
        let groonga = config.groonga();
        let store = GroongaClient::new(&groonga.url, groonga.timeout())?;
        let mut checkpoint = status;
        let stats = driver.run_pass(&store, &mut checkpoint, now).await?;
        Ok(PassOutput {
            dry_run,
            stats,
            operations: Vec::new(),
        })
    }
}

/// Repeat passes until Ctrl-C. A failed pass is logged and retried on the
/// next tick.
async fn watch_passes(config: &Config, dry_run: bool, json: bool) -> Result<()> {
    let interval = config.polling_interval();
    let mut shutdown = tokio::spawn(tokio::signal::ctrl_c());
    // Let the signal task install its handler before the first pass starts.
    tokio::task::yield_now().await;

    info!(
        delta_dir = %config.delta_dir().display(),
        interval_secs = interval.as_secs_f64(),
        "Watching for deltas"
    );

    loop {
        match run_pass(config, dry_run).await {
            Ok(output) => print_pass(&output, json)?,
            Err(e) => error!(error = %e, "Replay pass failed"),
        }

        tokio::select! {
            biased;

            signal = &mut shutdown => {
                match signal {
                    Ok(Ok(())) => info!("Shutdown requested"),
                    Ok(Err(e)) => warn!(error = %e, "Failed to listen for Ctrl-C"),
                    Err(e) => return Err(Error::Other(format!("Signal task failed: {e}"))),
                }
                return Ok(());
            }

            () = tokio::time::sleep(interval) => {}
        }
    }
}

fn print_pass(output: &PassOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(output)?);
        return Ok(());
    }
    if crate::is_quiet() {
        return Ok(());
    }

    let stats = &output.stats;
    if stats.is_empty() {
        println!("Nothing to replay.");
        return Ok(());
    }

    if output.dry_run {
        println!("{}", "Dry run (nothing sent, checkpoint unchanged)".yellow().bold());
        for operation in &output.operations {
            match operation {
                OperationOutput::ExecuteScript { path } => println!("  execute {path}"),
                OperationOutput::Load { table, rows } => {
                    println!("  load    {rows} row(s) into {table}");
                }
            }
        }
        println!();
    }

    let verb = if output.dry_run { "Would apply" } else { "Applied" };
    println!(
        "{} {} of {} target(s)",
        verb.green().bold(),
        stats.applied,
        stats.discovered
    );
    if stats.children_applied > 0 {
        println!("  Bundle children: {}", stats.children_applied);
    }
    if let Some(last) = stats.last_applied {
        println!("  Checkpoint:      {}", format_timestamp(&last));
    }
    Ok(())
}
