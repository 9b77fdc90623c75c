//! Delta file discovery.
//!
//! Scans one directory level at a time and turns timestamped file names
//! into [`Target`]s. Files that do not carry a timestamp prefix are
//! ignored, so unrelated files may live next to deltas.
//!
//! # Layout
//!
//! ```text
//! <delta_dir>/schema/<timestamp>[-<action>]<suffix>
//! <delta_dir>/schema/packed/<timestamp>/...
//! <delta_dir>/data/<table>/<timestamp>[-<action>]<suffix>
//! <delta_dir>/data/<table>/packed/<timestamp>/...
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::sync::file::{EntryKind, list_sorted};
use crate::sync::target::{TableContent, Target};
use crate::sync::timestamp::{DeltaName, parse_timestamp};
use crate::sync::types::SyncResult;

/// Directory holding schema deltas.
pub const SCHEMA_DIR: &str = "schema";
/// Directory holding one subdirectory per table.
pub const DATA_DIR: &str = "data";
/// Subdirectory of a namespace holding packed bundles.
pub const PACKED_DIR: &str = "packed";

/// Suffix of command script files.
pub const SCRIPT_SUFFIX: &str = ".grn";
/// Suffixes of parquet data files. The dotless form is accepted for
/// producers that append the extension without a separator.
pub const PARQUET_SUFFIXES: [&str; 2] = [".parquet", "parquet"];

/// Bounds on which timestamps a scan may return.
///
/// The lower bound is exclusive and the upper bound inclusive: a target
/// whose timestamp equals the checkpoint has already been applied, and a
/// target stamped exactly at the pass start is part of the pass.
///
/// A checkpoint that was never written reads as the Unix epoch, so a
/// replay pass never picks up deltas stamped at or before
/// `1970-01-01-00-00-00-000000000`. Only an unbounded window admits them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryWindow {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

impl DiscoveryWindow {
    #[must_use]
    pub fn new(min: Option<DateTime<Utc>>, max: Option<DateTime<Utc>>) -> Self {
        Self { min, max }
    }

    /// A window that admits every timestamp.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Whether `timestamp` falls inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.min.is_none_or(|min| timestamp > min) && self.max.is_none_or(|max| timestamp <= max)
    }

    /// Raise the lower bound to `floor` if it is later than the current one.
    #[must_use]
    pub fn raise_min(self, floor: DateTime<Utc>) -> Self {
        let min = match self.min {
            Some(min) if min >= floor => min,
            _ => floor,
        };
        Self {
            min: Some(min),
            max: self.max,
        }
    }
}

/// An independent stream of deltas.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Namespace {
    /// The global schema namespace.
    Schema,
    /// The data namespace of one table.
    Table(String),
}

impl Namespace {
    /// Classify a parsed file name into a target, or `None` if the file
    /// does not belong to this namespace.
    ///
    /// Table content is chosen by suffix alone. An action tag is carried
    /// through untouched for the store to interpret.
    fn classify(&self, path: PathBuf, name: &DeltaName<'_>) -> Option<Target> {
        match self {
            Self::Schema => (name.action.is_none() && name.suffix == SCRIPT_SUFFIX).then(|| {
                Target::SchemaFile {
                    path,
                    timestamp: name.timestamp,
                }
            }),
            Self::Table(table) => {
                let content = if name.suffix == SCRIPT_SUFFIX {
                    TableContent::Script
                } else if PARQUET_SUFFIXES.contains(&name.suffix) {
                    TableContent::Rows
                } else {
                    return None;
                };
                Some(Target::TableFile {
                    path,
                    timestamp: name.timestamp,
                    table: table.clone(),
                    action: name.action.map(str::to_string),
                    content,
                })
            }
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Table(table) => write!(f, "table:{table}"),
        }
    }
}

/// Visit every timestamped entry of `dir` inside `window`, in name order.
fn each_delta_entry(
    dir: &Path,
    kind: EntryKind,
    window: DiscoveryWindow,
    mut visit: impl FnMut(PathBuf, &DeltaName<'_>),
) -> SyncResult<()> {
    for (file_name, path) in list_sorted(dir, kind)? {
        let parsed = match parse_timestamp(&file_name) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                debug!(path = %path.display(), "Ignoring non-delta file");
                continue;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping delta file");
                continue;
            }
        };
        if !window.contains(parsed.timestamp) {
            continue;
        }
        visit(path, &parsed);
    }
    Ok(())
}

/// Discover loose delta files directly inside `dir` for `namespace`.
///
/// # Errors
///
/// Returns an error if `dir` exists but cannot be listed.
pub fn discover_loose(
    dir: &Path,
    window: DiscoveryWindow,
    namespace: &Namespace,
) -> SyncResult<Vec<Target>> {
    let mut targets = Vec::new();
    each_delta_entry(dir, EntryKind::File, window, |path, name| {
        if let Some(target) = namespace.classify(path, name) {
            targets.push(target);
        }
    })?;
    Ok(targets)
}

/// Discover packed bundle candidates in `<namespace_dir>/packed`.
///
/// A candidate is a directory named exactly by a timestamp: no action and
/// no suffix. Anything else in `packed/` is ignored, including a plain
/// file whose name is a bare timestamp.
///
/// # Errors
///
/// Returns an error if the packed directory exists but cannot be listed.
pub fn discover_packed(
    namespace_dir: &Path,
    window: DiscoveryWindow,
) -> SyncResult<Vec<(PathBuf, DateTime<Utc>)>> {
    let mut candidates = Vec::new();
    let packed_dir = namespace_dir.join(PACKED_DIR);
    each_delta_entry(&packed_dir, EntryKind::Dir, window, |path, name| {
        if name.action.is_none() && name.suffix.is_empty() {
            candidates.push((path, name.timestamp));
        }
    })?;
    Ok(candidates)
}

/// List table namespaces under `<delta_dir>/data`, sorted by table name.
///
/// # Errors
///
/// Returns an error if the data directory exists but cannot be listed.
pub fn discover_tables(delta_dir: &Path) -> SyncResult<Vec<(String, PathBuf)>> {
    list_sorted(&delta_dir.join(DATA_DIR), EntryKind::Dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::timestamp::parse_timestamp;
    use std::fs;
    use tempfile::TempDir;

    fn at(prefix: &str) -> DateTime<Utc> {
        parse_timestamp(prefix).unwrap().unwrap().timestamp
    }

    fn touch(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), "").unwrap();
    }

    fn names(targets: &[Target]) -> Vec<String> {
        targets
            .iter()
            .map(|t| t.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_window_bounds() {
        let window = DiscoveryWindow::new(
            Some(at("2024-01-01-00-00-00-000000000")),
            Some(at("2024-01-03-00-00-00-000000000")),
        );
        assert!(!window.contains(at("2024-01-01-00-00-00-000000000")));
        assert!(window.contains(at("2024-01-01-00-00-00-000000001")));
        assert!(window.contains(at("2024-01-03-00-00-00-000000000")));
        assert!(!window.contains(at("2024-01-03-00-00-00-000000001")));
        assert!(DiscoveryWindow::unbounded().contains(at("1999-01-01-00-00-00-000000000")));
    }

    #[test]
    fn test_raise_min_never_lowers() {
        let early = at("2024-01-01-00-00-00-000000000");
        let late = at("2024-01-02-00-00-00-000000000");

        let window = DiscoveryWindow::new(Some(late), None).raise_min(early);
        assert_eq!(window.min, Some(late));

        let window = DiscoveryWindow::new(Some(early), None).raise_min(late);
        assert_eq!(window.min, Some(late));

        let window = DiscoveryWindow::unbounded().raise_min(early);
        assert_eq!(window.min, Some(early));
    }

    #[test]
    fn test_schema_accepts_only_plain_scripts() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "2024-01-01-00-00-00-000000000.grn");
        touch(dir, "2024-01-01-00-00-01-000000000-delete.grn");
        touch(dir, "2024-01-01-00-00-02-000000000.parquet");
        touch(dir, "2024-01-01-00-00-03-000000000.grn.bak");
        touch(dir, "notes.txt");

        let targets = discover_loose(dir, DiscoveryWindow::unbounded(), &Namespace::Schema).unwrap();
        assert_eq!(names(&targets), ["2024-01-01-00-00-00-000000000.grn"]);
        assert!(matches!(targets[0], Target::SchemaFile { .. }));
    }

    #[test]
    fn test_table_classification() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "2024-03-01-00-00-00-000000000.parquet");
        touch(dir, "2024-03-02-00-00-00-000000000-delete.grn");
        touch(dir, "2024-03-03-00-00-00-000000000.grn");
        touch(dir, "2024-03-04-00-00-00-000000000-upsert.parquet");
        touch(dir, "2024-03-05-00-00-00-000000000.csv");

        let namespace = Namespace::Table("orders".to_string());
        let targets = discover_loose(dir, DiscoveryWindow::unbounded(), &namespace).unwrap();
        assert_eq!(targets.len(), 4);

        match &targets[0] {
            Target::TableFile {
                table,
                action,
                content,
                ..
            } => {
                assert_eq!(table, "orders");
                assert_eq!(action, &None);
                assert_eq!(*content, TableContent::Rows);
            }
            other => panic!("unexpected target {other:?}"),
        }
        match &targets[1] {
            Target::TableFile {
                action, content, ..
            } => {
                assert_eq!(action.as_deref(), Some("delete"));
                assert_eq!(*content, TableContent::Script);
            }
            other => panic!("unexpected target {other:?}"),
        }
        assert_eq!(targets[2].kind(), "table-script");
        match &targets[3] {
            Target::TableFile {
                action, content, ..
            } => {
                assert_eq!(action.as_deref(), Some("upsert"));
                assert_eq!(*content, TableContent::Rows);
            }
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn test_epoch_checkpoint_excludes_epoch_stamp() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "1970-01-01-00-00-00-000000000.grn");
        touch(dir, "1970-01-01-00-00-00-000000001.grn");

        let window = DiscoveryWindow::new(Some(DateTime::UNIX_EPOCH), None);
        let targets = discover_loose(dir, window, &Namespace::Schema).unwrap();
        assert_eq!(names(&targets), ["1970-01-01-00-00-00-000000001.grn"]);

        let targets = discover_loose(dir, DiscoveryWindow::unbounded(), &Namespace::Schema).unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_loose_window_filtering() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "2024-01-01-00-00-00-000000000.grn");
        touch(dir, "2024-01-02-00-00-00-000000000.grn");
        touch(dir, "2024-01-03-00-00-00-000000000.grn");

        let window = DiscoveryWindow::new(
            Some(at("2024-01-01-00-00-00-000000000")),
            Some(at("2024-01-02-00-00-00-000000000")),
        );
        let targets = discover_loose(dir, window, &Namespace::Schema).unwrap();
        assert_eq!(names(&targets), ["2024-01-02-00-00-00-000000000.grn"]);
    }

    #[test]
    fn test_invalid_timestamp_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "2024-02-30-00-00-00-000000000.grn");
        touch(dir, "2024-02-28-00-00-00-000000000.grn");

        let targets = discover_loose(dir, DiscoveryWindow::unbounded(), &Namespace::Schema).unwrap();
        assert_eq!(names(&targets), ["2024-02-28-00-00-00-000000000.grn"]);
    }

    #[test]
    fn test_packed_requires_bare_timestamp_directory() {
        let temp_dir = TempDir::new().unwrap();
        let packed = temp_dir.path().join(PACKED_DIR);
        fs::create_dir_all(packed.join("2024-01-02-00-00-00-000000000")).unwrap();
        fs::create_dir_all(packed.join("2024-01-03-00-00-00-000000000-delete")).unwrap();
        fs::create_dir_all(packed.join("2024-01-04-00-00-00-000000000.tmp")).unwrap();
        fs::create_dir_all(packed.join("scratch")).unwrap();
        touch(&packed, "2024-01-05-00-00-00-000000000");

        let candidates = discover_packed(temp_dir.path(), DiscoveryWindow::unbounded()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].1, at("2024-01-02-00-00-00-000000000"));
    }

    #[test]
    fn test_packed_honors_window() {
        let temp_dir = TempDir::new().unwrap();
        let packed = temp_dir.path().join(PACKED_DIR);
        fs::create_dir_all(packed.join("2024-01-02-00-00-00-000000000")).unwrap();

        let window = DiscoveryWindow::new(Some(at("2024-01-02-00-00-00-000000000")), None);
        assert!(discover_packed(temp_dir.path(), window).unwrap().is_empty());
    }

    #[test]
    fn test_discover_tables_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join(DATA_DIR);
        fs::create_dir_all(data.join("orders")).unwrap();
        fs::create_dir_all(data.join("items")).unwrap();
        touch(&data, "README");

        let tables = discover_tables(temp_dir.path()).unwrap();
        let names: Vec<_> = tables.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["items", "orders"]);
    }

    #[test]
    fn test_missing_directories_are_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover_tables(temp_dir.path()).unwrap().is_empty());
        let targets = discover_loose(
            &temp_dir.path().join(SCHEMA_DIR),
            DiscoveryWindow::unbounded(),
            &Namespace::Schema,
        )
        .unwrap();
        assert!(targets.is_empty());
    }
}
