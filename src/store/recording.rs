//! Store that records operations instead of sending them.
//!
//! Used for `--dry-run` and in tests. Scripts are checked for readability
//! and parquet rows are still decoded by the caller, so a dry run catches
//! unreadable deltas without touching the server.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::info;

use super::{Row, StoreClient, StoreError, StoreResult};

/// One operation seen by a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Script(PathBuf),
    Load { table: String, rows: usize },
}

/// A [`StoreClient`] that keeps a log of what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingStore {
    operations: Mutex<Vec<Operation>>,
}

impl RecordingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations recorded so far, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, operation: Operation) {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
    }
}

impl StoreClient for RecordingStore {
    async fn execute_script(&self, path: &Path) -> StoreResult<()> {
        std::fs::metadata(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Would execute script");
        self.record(Operation::Script(path.to_path_buf()));
        Ok(())
    }

    async fn load(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        info!(table, rows = rows.len(), "Would load rows");
        self.record(Operation::Load {
            table: table.to_string(),
            rows: rows.len(),
        });
        Ok(())
    }
}
