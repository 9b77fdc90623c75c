//! File system helpers for delta replay.
//!
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - Sorted directory listings, so discovery order never depends on the
//!   order the OS happens to return entries in

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::sync::types::{SyncError, SyncResult};

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file next to the target (`<name>.tmp`)
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    let mut temp_name = path.file_name().map(OsString::from).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }

    {
        let file = File::create(&temp_path).map_err(|e| SyncError::io(&temp_path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(content.as_bytes())
            .and_then(|()| writer.flush())
            .and_then(|()| writer.get_ref().sync_all())
            .map_err(|e| SyncError::io(&temp_path, e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| SyncError::io(path, e))?;

    Ok(())
}

/// What kind of directory entries to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular files only.
    File,
    /// Directories only.
    Dir,
}

/// List the immediate entries of `dir` of the given kind, sorted by name.
///
/// A missing directory lists as empty. Entries whose names are not valid
/// UTF-8 are skipped since they can never carry a timestamp prefix.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn list_sorted(dir: &Path, kind: EntryKind) -> SyncResult<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SyncError::io(dir, e)),
    };

    let mut listed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(dir, e))?;
        let path = entry.path();
        let matches = match kind {
            EntryKind::File => path.is_file(),
            EntryKind::Dir => path.is_dir(),
        };
        if !matches {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            listed.push((name, path));
        }
    }

    listed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(listed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("status.yaml");

        atomic_write(&path, "start_time: 1\n").unwrap();
        atomic_write(&path, "start_time: 2\n").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "start_time: 2\n");
        assert!(!temp_dir.path().join("status.yaml.tmp").exists());
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("status.yaml");

        atomic_write(&path, "x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_list_sorted_filters_kind() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.grn"), "").unwrap();
        fs::write(temp_dir.path().join("a.grn"), "").unwrap();
        fs::create_dir(temp_dir.path().join("packed")).unwrap();

        let files = list_sorted(temp_dir.path(), EntryKind::File).unwrap();
        let names: Vec<_> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a.grn", "b.grn"]);

        let dirs = list_sorted(temp_dir.path(), EntryKind::Dir).unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].0, "packed");
    }

    #[test]
    fn test_list_sorted_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let listed = list_sorted(&temp_dir.path().join("nope"), EntryKind::File).unwrap();
        assert!(listed.is_empty());
    }
}
