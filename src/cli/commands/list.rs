//! List command implementation.
//!
//! Runs discovery and sorting only: nothing is sent to Groonga and the
//! checkpoint is left untouched.

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::sync::{Checkpoint, ReplayDriver, StatusFile};

use super::{TargetOutput, checkpoint_display};

#[derive(Serialize)]
struct ListOutput {
    checkpoint: Option<String>,
    count: usize,
    targets: Vec<TargetOutput>,
}

/// Execute the list command.
pub fn execute(config: &Config, json: bool) -> Result<()> {
    let delta_dir = config.delta_dir();
    let checkpoint = StatusFile::in_dir(config.dir())?.last_applied();
    let targets = ReplayDriver::new(&delta_dir).pending(checkpoint, Utc::now())?;

    let output = ListOutput {
        checkpoint: checkpoint_display(checkpoint),
        count: targets.len(),
        targets: targets
            .iter()
            .map(|target| TargetOutput::new(target, &delta_dir))
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if output.targets.is_empty() {
        println!("No pending targets in {}", delta_dir.display());
        return Ok(());
    }

    println!(
        "{} ({} pending)",
        "Pending targets".bold().underline(),
        output.count
    );
    println!();
    for target in &output.targets {
        let children = if target.children > 0 {
            format!(" [{} file(s)]", target.children)
        } else {
            String::new()
        };
        println!(
            "  {}  {:<13} {:<12} {}{}",
            target.timestamp.dimmed(),
            target.kind.cyan(),
            target.namespace,
            target.path,
            children
        );
    }
    Ok(())
}
