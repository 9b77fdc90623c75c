//! groonga-sync CLI entry point.

use clap::Parser;
use groonga_sync::cli::commands;
use groonga_sync::cli::{Cli, Commands};
use groonga_sync::config::Config;
use groonga_sync::error::Result;
use groonga_sync::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.quiet {
        groonga_sync::QUIET.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(&cli.dir);

    // Completions never write to the log file.
    let log_config = match (&cli.command, &config) {
        (Some(Commands::Completions { .. }), _) | (_, Err(_)) => None,
        (_, Ok(config)) => Some(config),
    };

    let result = match logging::init(cli.verbose, cli.quiet, log_config) {
        Ok(()) => run(&cli, config),
        Err(e) => Err(e),
    };

    // Run the command and handle errors
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if let Some(hint) = e.hint() {
                eprintln!("Error: {e}\n  Hint: {hint}");
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli, config: Result<Config>) -> Result<()> {
    match &cli.command {
        // Shell completions
        Some(Commands::Completions { shell }) => commands::completions::execute(shell),

        // Replay
        None => commands::run::execute(&config?, false, cli.dry_run, cli.json),
        Some(Commands::Run { watch }) => {
            commands::run::execute(&config?, *watch, cli.dry_run, cli.json)
        }

        // Inspection
        Some(Commands::List) => commands::list::execute(&config?, cli.json),
        Some(Commands::Status) => commands::status::execute(&config?, cli.json),
    }
}
