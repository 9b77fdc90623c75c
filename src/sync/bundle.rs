//! Packed bundle resolution.
//!
//! A packed bundle is an immutable directory of deltas that supersedes
//! every earlier delta of its namespace. For each namespace only the newest
//! bundle in the window is used; loose files at or before its timestamp are
//! already inside it and are not replayed again.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::sync::discovery::{DiscoveryWindow, Namespace, discover_loose, discover_packed};
use crate::sync::target::Target;
use crate::sync::types::SyncResult;

/// Build the candidate targets of one namespace: the latest bundle (if any)
/// followed by the loose files newer than it.
///
/// The result is not globally ordered; the replay driver sorts the
/// concatenation of all namespaces.
///
/// # Errors
///
/// Returns an error if a namespace or bundle directory cannot be listed.
pub fn resolve_namespace(
    namespace_dir: &Path,
    namespace: &Namespace,
    window: DiscoveryWindow,
) -> SyncResult<Vec<Target>> {
    let mut targets = Vec::new();
    let mut loose_window = window;

    if let Some((path, timestamp)) = latest_candidate(discover_packed(namespace_dir, window)?) {
        // Bundles are immutable: every child is part of it.
        let children = discover_loose(&path, DiscoveryWindow::unbounded(), namespace)?;
        debug!(
            %namespace,
            bundle = %path.display(),
            children = children.len(),
            "Selected packed bundle"
        );
        loose_window = window.raise_min(timestamp);
        targets.push(make_bundle(namespace, path, timestamp, children));
    }

    targets.extend(discover_loose(namespace_dir, loose_window, namespace)?);
    Ok(targets)
}

/// Pick the newest candidate. On equal timestamps the first one seen wins.
fn latest_candidate(
    candidates: Vec<(PathBuf, DateTime<Utc>)>,
) -> Option<(PathBuf, DateTime<Utc>)> {
    let mut latest: Option<(PathBuf, DateTime<Utc>)> = None;
    for candidate in candidates {
        let newer = latest
            .as_ref()
            .is_none_or(|(_, timestamp)| candidate.1 > *timestamp);
        if newer {
            latest = Some(candidate);
        }
    }
    latest
}

fn make_bundle(
    namespace: &Namespace,
    path: PathBuf,
    timestamp: DateTime<Utc>,
    children: Vec<Target>,
) -> Target {
    match namespace {
        Namespace::Schema => Target::PackedSchemaBundle {
            path,
            timestamp,
            children,
        },
        Namespace::Table(table) => Target::PackedTableBundle {
            path,
            timestamp,
            table: table.clone(),
            children,
        },
    }
}
