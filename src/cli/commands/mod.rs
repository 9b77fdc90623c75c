//! Command implementations.

pub mod completions;
pub mod list;
pub mod run;
pub mod status;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::sync::{Target, format_timestamp};

/// Build the runtime async work is driven on.
///
/// Replay is strictly sequential, so a single-threaded runtime is enough.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

/// One target as shown by `list` and `status`.
#[derive(Serialize)]
pub(crate) struct TargetOutput {
    timestamp: String,
    kind: &'static str,
    namespace: String,
    path: String,
    children: usize,
}

impl TargetOutput {
    pub(crate) fn new(target: &Target, delta_dir: &Path) -> Self {
        let path = target.path();
        Self {
            timestamp: format_timestamp(&target.timestamp()),
            kind: target.kind(),
            namespace: target.table().unwrap_or("schema").to_string(),
            path: path
                .strip_prefix(delta_dir)
                .unwrap_or(path)
                .display()
                .to_string(),
            children: target.children().len(),
        }
    }
}

/// Checkpoint for display; `None` while nothing has been applied.
pub(crate) fn checkpoint_display(checkpoint: DateTime<Utc>) -> Option<String> {
    (checkpoint != DateTime::UNIX_EPOCH).then(|| format_timestamp(&checkpoint))
}
