//! Shared types for delta replay.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::StoreError;

/// Statistics for one replay pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReplayStats {
    /// Number of top-level targets found for this pass.
    pub discovered: usize,
    /// Number of top-level targets applied (and checkpointed).
    pub applied: usize,
    /// Number of store operations issued for bundle children.
    pub children_applied: usize,
    /// Timestamp of the last applied target, if any.
    pub last_applied: Option<DateTime<Utc>>,
}

impl ReplayStats {
    /// Returns true if nothing was pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.discovered == 0
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Listing or reading a delta directory failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Directory or file being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The store rejected a target.
    #[error("failed to apply {}: {source}", path.display())]
    Apply {
        /// Path of the failing delta file.
        path: PathBuf,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// Reading or writing the checkpoint failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_stats_default_is_empty() {
        let stats = ReplayStats::default();
        assert!(stats.is_empty());
        assert!(stats.last_applied.is_none());
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = SyncError::io(
            "/delta/schema",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = err.to_string();
        assert!(message.contains("/delta/schema"));
        assert!(message.contains("denied"));
    }
}
