//! Store clients.
//!
//! The replay engine only decides which delta files are sent and in what
//! order. Everything about talking to Groonga lives here:
//!
//! - [`StoreClient`] - the two operations replay needs
//! - [`GroongaClient`] - HTTP client for a Groonga server
//! - [`RecordingStore`] - records operations instead of sending them
//! - [`command`] - parser for `.grn` command scripts
//! - [`read_parquet_rows`] - parquet data files to JSON rows

pub mod command;
mod groonga;
mod parquet_rows;
mod recording;

use std::future::Future;
use std::path::{Path, PathBuf};

pub use groonga::GroongaClient;
pub use parquet_rows::read_parquet_rows;
pub use recording::{Operation, RecordingStore};

/// One row of a structured load: column name to value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A sink for delta files.
///
/// Calls are issued strictly one at a time; implementations never see
/// concurrent requests from the replay engine.
pub trait StoreClient: Send + Sync {
    /// Execute the command script at `path`.
    fn execute_script(&self, path: &Path) -> impl Future<Output = StoreResult<()>> + Send;

    /// Load `rows` into `table`.
    fn load(&self, table: &str, rows: Vec<Row>) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Errors raised while applying a delta file to the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("failed to decode {}: {message}", path.display())]
    Parquet { path: PathBuf, message: String },

    #[error("invalid store URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request for '{command}' failed: {source}")]
    Http {
        command: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("'{command}' returned HTTP {status}: {body}")]
    Status {
        command: String,
        status: u16,
        body: String,
    },

    #[error("'{command}' failed with return code {code}: {message}")]
    Command {
        command: String,
        code: i64,
        message: String,
    },

    #[error("unexpected response to '{command}': {message}")]
    Response { command: String, message: String },
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
