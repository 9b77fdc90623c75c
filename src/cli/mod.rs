//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// groonga-sync - Replay a timestamped delta directory into Groonga
///
/// Without a command, runs exactly one replay pass and exits.
#[derive(Parser, Debug)]
#[command(name = "groonga-sync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding config.yaml and status.yaml
    #[arg(long, global = true, env = "GROONGA_SYNC_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Show what would be applied without contacting Groonga or saving the checkpoint
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a replay pass (the default)
    Run {
        /// Keep running, one pass every `polling_interval` seconds, until Ctrl-C
        #[arg(long)]
        watch: bool,
    },

    /// List pending targets in replay order
    List,

    /// Show the checkpoint and number of pending targets
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
