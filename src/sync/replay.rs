//! Replay driver.
//!
//! One pass reads the checkpoint, discovers every namespace inside the
//! window `(checkpoint, now]`, sorts the targets by timestamp and applies
//! them one at a time. The checkpoint advances after each applied target,
//! so a pass that fails part way resumes after the last success. Targets
//! sharing a timestamp are checkpointed together once the last of them is
//! applied, since the window's lower bound is exclusive.
//!
//! ```text
//! Idle -> Discovering -> Sorting -> Applying(0) -> ... -> Applying(n-1) -> Idle
//! ```
//!
//! A failure while applying aborts the pass and leaves the driver in
//! `Applying(i)` for the failing index until the next pass starts.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace};

use crate::store::StoreClient;
use crate::sync::bundle::resolve_namespace;
use crate::sync::checkpoint::Checkpoint;
use crate::sync::discovery::{DiscoveryWindow, Namespace, SCHEMA_DIR, discover_tables};
use crate::sync::target::Target;
use crate::sync::types::{ReplayStats, SyncResult};

/// Where the driver is within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Discovering,
    Sorting,
    /// Applying the target at this index of the sorted plan.
    Applying(usize),
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Discovering => write!(f, "discovering"),
            Self::Sorting => write!(f, "sorting"),
            Self::Applying(index) => write!(f, "applying({index})"),
        }
    }
}

/// Discover and order the targets of every namespace under `delta_dir`.
///
/// The schema namespace comes first, then tables in name order; the stable
/// sort by timestamp keeps that order for equal timestamps.
///
/// # Errors
///
/// Returns an error if a delta directory exists but cannot be listed.
pub fn plan(delta_dir: &Path, window: DiscoveryWindow) -> SyncResult<Vec<Target>> {
    let mut targets = discover_all(delta_dir, window)?;
    targets.sort_by_key(Target::timestamp);
    Ok(targets)
}

fn discover_all(delta_dir: &Path, window: DiscoveryWindow) -> SyncResult<Vec<Target>> {
    let mut targets = resolve_namespace(&delta_dir.join(SCHEMA_DIR), &Namespace::Schema, window)?;
    for (table, table_dir) in discover_tables(delta_dir)? {
        let namespace = Namespace::Table(table);
        let found = resolve_namespace(&table_dir, &namespace, window)?;
        trace!(%namespace, targets = found.len(), "Resolved namespace");
        targets.extend(found);
    }
    Ok(targets)
}

/// Runs replay passes over one delta directory.
#[derive(Debug)]
pub struct ReplayDriver {
    delta_dir: PathBuf,
    state: ReplayState,
}

impl ReplayDriver {
    #[must_use]
    pub fn new(delta_dir: impl Into<PathBuf>) -> Self {
        Self {
            delta_dir: delta_dir.into(),
            state: ReplayState::Idle,
        }
    }

    #[must_use]
    pub fn delta_dir(&self) -> &Path {
        &self.delta_dir
    }

    #[must_use]
    pub fn state(&self) -> ReplayState {
        self.state
    }

    fn enter(&mut self, state: ReplayState) {
        trace!(from = %self.state, to = %state, "Replay state change");
        self.state = state;
    }

    /// Pending targets for a pass starting at `checkpoint` and bounded by `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a delta directory exists but cannot be listed.
    pub fn pending(
        &mut self,
        checkpoint: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SyncResult<Vec<Target>> {
        let window = DiscoveryWindow::new(Some(checkpoint), Some(now));

        self.enter(ReplayState::Discovering);
        let mut targets = match discover_all(&self.delta_dir, window) {
            Ok(targets) => targets,
            Err(e) => {
                self.enter(ReplayState::Idle);
                return Err(e);
            }
        };

        self.enter(ReplayState::Sorting);
        targets.sort_by_key(Target::timestamp);
        self.enter(ReplayState::Idle);

        debug!(
            delta_dir = %self.delta_dir.display(),
            since = %checkpoint,
            until = %now,
            pending = targets.len(),
            "Planned replay pass"
        );
        Ok(targets)
    }

    /// Run one pass: apply every pending target in order, advancing
    /// `checkpoint` after each one.
    ///
    /// When several targets share a timestamp, the checkpoint moves only
    /// after the last of them, so a failure inside the group resends the
    /// whole group on the next pass.
    ///
    /// `now` is the upper bound of the pass; files stamped later are left
    /// for the next pass.
    ///
    /// # Errors
    ///
    /// Returns the first discovery, apply or checkpoint error. Targets
    /// applied before the failure stay checkpointed.
    pub async fn run_pass<S, C>(
        &mut self,
        store: &S,
        checkpoint: &mut C,
        now: DateTime<Utc>,
    ) -> SyncResult<ReplayStats>
    where
        S: StoreClient,
        C: Checkpoint,
    {
        let targets = self.pending(checkpoint.last_applied(), now)?;
        let mut stats = ReplayStats {
            discovered: targets.len(),
            ..ReplayStats::default()
        };

        for (index, target) in targets.iter().enumerate() {
            self.enter(ReplayState::Applying(index));

            let operations = target.sync(store).await?;
            if target.is_bundle() {
                stats.children_applied += operations;
            }
            let group_continues = targets
                .get(index + 1)
                .is_some_and(|next| next.timestamp() == target.timestamp());
            if !group_continues {
                checkpoint.advance(target.timestamp())?;
            }

            stats.applied += 1;
            stats.last_applied = Some(target.timestamp());
            info!(
                kind = target.kind(),
                path = %target.path().display(),
                timestamp = %target.timestamp(),
                "Applied target"
            );
        }

        self.enter(ReplayState::Idle);
        Ok(stats)
    }
}
