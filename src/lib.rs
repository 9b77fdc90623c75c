//! groonga-sync - Replay a timestamped delta directory into Groonga
//!
//! This crate provides the core functionality for the `groonga-sync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`sync`] - Delta discovery, bundle resolution, replay and checkpointing
//! - [`store`] - Groonga HTTP client, command script parser, parquet reader
//! - [`config`] - Configuration loaded from `config.yaml`
//! - [`logging`] - Tracing subscriber with a rotating log file
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod sync;

pub use error::{Error, Result};

/// Global quiet flag for `--quiet` output.
///
/// When set, commands skip their human-readable summaries. Errors and
/// `--json` output are still printed.
pub static QUIET: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if quiet mode is active.
#[inline]
pub fn is_quiet() -> bool {
    QUIET.load(std::sync::atomic::Ordering::Relaxed)
}
