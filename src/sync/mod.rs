//! Delta discovery and replay.
//!
//! This module decides which delta files are sent to the store and in what
//! order:
//!
//! - **Timestamps**: parse the fixed-width prefix of delta file names
//! - **Discovery**: scan schema and table namespaces within a time window
//! - **Bundles**: merge the newest packed bundle with the loose files after it
//! - **Replay**: apply targets in global timestamp order, checkpointing each
//!
//! # Architecture
//!
//! A pass runs as follows:
//! 1. The checkpoint gives the lower bound; "now" is the upper bound
//! 2. Each namespace is resolved into `[bundle?] + loose files`
//! 3. All namespaces are concatenated and stably sorted by timestamp
//! 4. Each target is applied, then the checkpoint is advanced to its timestamp
//!
//! # Example
//!
//! ```ignore
//! use groonga_sync::store::GroongaClient;
//! use groonga_sync::sync::{ReplayDriver, StatusFile};
//!
//! let store = GroongaClient::new("http://127.0.0.1:10041", None)?;
//! let mut checkpoint = StatusFile::in_dir(&dir)?;
//! let mut driver = ReplayDriver::new(dir.join("delta"));
//! let stats = driver.run_pass(&store, &mut checkpoint, Utc::now()).await?;
//! ```

mod bundle;
mod checkpoint;
mod discovery;
mod file;
mod replay;
mod target;
mod timestamp;
mod types;

pub use bundle::resolve_namespace;
pub use checkpoint::{Checkpoint, MemoryCheckpoint, STATUS_FILE, StatusFile};
pub use discovery::{
    DATA_DIR, DiscoveryWindow, Namespace, PACKED_DIR, PARQUET_SUFFIXES, SCHEMA_DIR, SCRIPT_SUFFIX,
    discover_loose, discover_packed, discover_tables,
};
pub use file::atomic_write;
pub use replay::{ReplayDriver, ReplayState, plan};
pub use target::{TableContent, Target};
pub use timestamp::{DeltaName, TimestampError, format_timestamp, parse_timestamp};
pub use types::{ReplayStats, SyncError, SyncResult};
