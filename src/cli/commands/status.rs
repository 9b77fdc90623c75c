//! Status command implementation.

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::sync::{Checkpoint, ReplayDriver, StatusFile};

use super::{TargetOutput, checkpoint_display};

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    dir: String,
    status_file: String,
    delta_dir: String,
    groonga_url: String,
    checkpoint: Option<String>,
    pending: usize,
    next: Option<TargetOutput>,
}

/// Execute status command.
pub fn execute(config: &Config, json: bool) -> Result<()> {
    let delta_dir = config.delta_dir();
    let status = StatusFile::in_dir(config.dir())?;
    let checkpoint = status.last_applied();
    let targets = ReplayDriver::new(&delta_dir).pending(checkpoint, Utc::now())?;

    let output = StatusOutput {
        dir: config.dir().display().to_string(),
        status_file: status.path().display().to_string(),
        delta_dir: delta_dir.display().to_string(),
        groonga_url: config.groonga().url.clone(),
        checkpoint: checkpoint_display(checkpoint),
        pending: targets.len(),
        next: targets
            .first()
            .map(|target| TargetOutput::new(target, &delta_dir)),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "Replay Status".bold().underline());
    println!();
    println!("  Delta dir:   {}", output.delta_dir);
    println!("  Groonga:     {}", output.groonga_url);
    println!("  Status file: {}", output.status_file);
    match &output.checkpoint {
        Some(checkpoint) => println!("  Checkpoint:  {checkpoint}"),
        None => println!("  Checkpoint:  {}", "(nothing applied yet)".dimmed()),
    }
    println!();

    if output.pending == 0 {
        println!("{}", "Up to date.".green());
    } else {
        println!(
            "{} {} target(s)",
            "Pending:".yellow().bold(),
            output.pending
        );
        if let Some(next) = &output.next {
            println!("  Next: {} {} ({})", next.timestamp, next.path, next.kind);
        }
        println!();
        println!("Run `groonga-sync run` to replay, or `groonga-sync list` to see them all.");
    }
    Ok(())
}
