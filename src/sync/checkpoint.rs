//! Replay checkpoint.
//!
//! The checkpoint is the timestamp of the last applied target. It is read
//! once at the start of a pass and advanced after every applied target.
//! It never moves backwards.
//!
//! The on-disk form is `status.yaml` in the working directory:
//!
//! ```yaml
//! start_time: 1704153600
//! start_time_nanos: 0
//! ```
//!
//! Other keys in the file are preserved across updates.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::sync::file::atomic_write;
use crate::sync::types::{SyncError, SyncResult};

/// Name of the status file inside the working directory.
pub const STATUS_FILE: &str = "status.yaml";

const START_TIME_KEY: &str = "start_time";
const START_TIME_NANOS_KEY: &str = "start_time_nanos";

/// Durable record of the last applied timestamp.
pub trait Checkpoint {
    /// The last applied timestamp; the Unix epoch if nothing was applied yet.
    fn last_applied(&self) -> DateTime<Utc>;

    /// Record `timestamp` as applied. The write is durable when this
    /// returns. Returns `false` without writing if `timestamp` is not
    /// newer than the current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be persisted.
    fn advance(&mut self, timestamp: DateTime<Utc>) -> SyncResult<bool>;
}

/// Checkpoint stored in a YAML status file.
#[derive(Debug)]
pub struct StatusFile {
    path: PathBuf,
    data: Mapping,
    current: DateTime<Utc>,
}

impl StatusFile {
    /// Open the status file at `path`. A missing file starts at the epoch.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(content) => parse_status(&path, &content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Mapping::new(),
            Err(e) => return Err(SyncError::io(&path, e)),
        };
        let current = decode_start_time(&path, &data)?;
        Ok(Self {
            path,
            data,
            current,
        })
    }

    /// Open `status.yaml` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn in_dir(dir: &Path) -> SyncResult<Self> {
        Self::open(dir.join(STATUS_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Checkpoint for StatusFile {
    fn last_applied(&self) -> DateTime<Utc> {
        self.current
    }

    fn advance(&mut self, timestamp: DateTime<Utc>) -> SyncResult<bool> {
        if timestamp <= self.current {
            return Ok(false);
        }

        let mut data = self.data.clone();
        data.insert(
            Value::from(START_TIME_KEY),
            Value::from(timestamp.timestamp()),
        );
        data.insert(
            Value::from(START_TIME_NANOS_KEY),
            Value::from(timestamp.timestamp_subsec_nanos()),
        );
        let content = serde_yaml::to_string(&data)
            .map_err(|e| SyncError::Checkpoint(format!("failed to encode status: {e}")))?;
        atomic_write(&self.path, &content)?;

        debug!(path = %self.path.display(), checkpoint = %timestamp, "Saved checkpoint");
        self.data = data;
        self.current = timestamp;
        Ok(true)
    }
}

fn parse_status(path: &Path, content: &str) -> SyncResult<Mapping> {
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(SyncError::Checkpoint(format!(
            "{} is not a mapping",
            path.display()
        ))),
        Err(e) => Err(SyncError::Checkpoint(format!(
            "failed to parse {}: {e}",
            path.display()
        ))),
    }
}

fn decode_start_time(path: &Path, data: &Mapping) -> SyncResult<DateTime<Utc>> {
    let invalid = |key: &str| {
        SyncError::Checkpoint(format!("invalid {key} in {}", path.display()))
    };

    let seconds = match data.get(START_TIME_KEY) {
        None | Some(Value::Null) => 0,
        Some(value) => value.as_i64().ok_or_else(|| invalid(START_TIME_KEY))?,
    };
    let nanos = match data.get(START_TIME_NANOS_KEY) {
        None | Some(Value::Null) => 0,
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid(START_TIME_NANOS_KEY))?,
    };

    DateTime::from_timestamp(seconds, nanos).ok_or_else(|| invalid(START_TIME_KEY))
}

/// Checkpoint held in memory only.
///
/// Backs dry runs, which must not persist anything, and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoint {
    current: Option<DateTime<Utc>>,
    history: Vec<DateTime<Utc>>,
}

impl MemoryCheckpoint {
    #[must_use]
    pub fn starting_at(timestamp: DateTime<Utc>) -> Self {
        Self {
            current: Some(timestamp),
            history: Vec::new(),
        }
    }

    /// Every value passed to a successful `advance`, oldest first.
    #[must_use]
    pub fn history(&self) -> &[DateTime<Utc>] {
        &self.history
    }
}

impl Checkpoint for MemoryCheckpoint {
    fn last_applied(&self) -> DateTime<Utc> {
        self.current.unwrap_or(DateTime::UNIX_EPOCH)
    }

    fn advance(&mut self, timestamp: DateTime<Utc>) -> SyncResult<bool> {
        if timestamp <= self.last_applied() {
            return Ok(false);
        }
        self.current = Some(timestamp);
        self.history.push(timestamp);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_missing_status_starts_at_epoch() {
        let temp_dir = TempDir::new().unwrap();
        let status = StatusFile::in_dir(temp_dir.path()).unwrap();
        assert_eq!(status.last_applied(), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_advance_persists_nanoseconds() {
        let temp_dir = TempDir::new().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(42);

        let mut status = StatusFile::in_dir(temp_dir.path()).unwrap();
        assert!(status.advance(ts).unwrap());

        let reopened = StatusFile::in_dir(temp_dir.path()).unwrap();
        assert_eq!(reopened.last_applied(), ts);

        let content = fs::read_to_string(temp_dir.path().join(STATUS_FILE)).unwrap();
        assert!(content.contains("start_time: 1704153600"));
        assert!(content.contains("start_time_nanos: 42"));
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let temp_dir = TempDir::new().unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut status = StatusFile::in_dir(temp_dir.path()).unwrap();
        assert!(status.advance(later).unwrap());
        assert!(!status.advance(earlier).unwrap());
        assert!(!status.advance(later).unwrap());
        assert_eq!(status.last_applied(), later);
    }

    #[test]
    fn test_seconds_only_status_is_accepted() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(STATUS_FILE),
            "start_time: 1704067200\nowner: ops\n",
        )
        .unwrap();

        let mut status = StatusFile::in_dir(temp_dir.path()).unwrap();
        assert_eq!(
            status.last_applied(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );

        status
            .advance(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
            .unwrap();
        let content = fs::read_to_string(temp_dir.path().join(STATUS_FILE)).unwrap();
        assert!(content.contains("owner: ops"));
    }

    #[test]
    fn test_malformed_status_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(STATUS_FILE), "start_time: soon\n").unwrap();
        let err = StatusFile::in_dir(temp_dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::Checkpoint(_)));
    }

    #[test]
    fn test_memory_checkpoint_history() {
        let mut checkpoint = MemoryCheckpoint::default();
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(checkpoint.advance(ts).unwrap());
        assert!(!checkpoint.advance(ts).unwrap());
        assert_eq!(checkpoint.history(), &[ts]);
    }
}
