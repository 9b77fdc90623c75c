//! Replay targets.
//!
//! A [`Target`] is one timestamped unit of work. Loose delta files map to
//! [`Target::SchemaFile`] and [`Target::TableFile`]; packed bundles wrap an
//! ordered list of child targets and are applied (and checkpointed) as a
//! single unit.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::store::{StoreClient, read_parquet_rows};
use crate::sync::types::{SyncError, SyncResult};

/// How a table delta file is sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableContent {
    /// A command script, executed as-is.
    Script,
    /// A parquet file, loaded as rows into the table.
    Rows,
}

/// One ordered, timestamped unit of replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A schema command script.
    SchemaFile {
        path: PathBuf,
        timestamp: DateTime<Utc>,
    },
    /// A packed archive of schema targets.
    PackedSchemaBundle {
        path: PathBuf,
        timestamp: DateTime<Utc>,
        children: Vec<Target>,
    },
    /// A delta file for one table.
    TableFile {
        path: PathBuf,
        timestamp: DateTime<Utc>,
        table: String,
        action: Option<String>,
        content: TableContent,
    },
    /// A packed archive of one table's targets.
    PackedTableBundle {
        path: PathBuf,
        timestamp: DateTime<Utc>,
        table: String,
        children: Vec<Target>,
    },
}

impl Target {
    /// The ordering key. For bundles this is the newest timestamp they cover.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SchemaFile { timestamp, .. }
            | Self::PackedSchemaBundle { timestamp, .. }
            | Self::TableFile { timestamp, .. }
            | Self::PackedTableBundle { timestamp, .. } => *timestamp,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::SchemaFile { path, .. }
            | Self::PackedSchemaBundle { path, .. }
            | Self::TableFile { path, .. }
            | Self::PackedTableBundle { path, .. } => path,
        }
    }

    /// Table this target belongs to, or `None` for the schema namespace.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::TableFile { table, .. } | Self::PackedTableBundle { table, .. } => Some(table),
            Self::SchemaFile { .. } | Self::PackedSchemaBundle { .. } => None,
        }
    }

    /// Children of a bundle in stored order; empty for loose files.
    #[must_use]
    pub fn children(&self) -> &[Target] {
        match self {
            Self::PackedSchemaBundle { children, .. } | Self::PackedTableBundle { children, .. } => {
                children
            }
            Self::SchemaFile { .. } | Self::TableFile { .. } => &[],
        }
    }

    #[must_use]
    pub fn is_bundle(&self) -> bool {
        matches!(
            self,
            Self::PackedSchemaBundle { .. } | Self::PackedTableBundle { .. }
        )
    }

    /// Short label for listings and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaFile { .. } => "schema",
            Self::PackedSchemaBundle { .. } => "packed-schema",
            Self::TableFile {
                content: TableContent::Script,
                ..
            } => "table-script",
            Self::TableFile {
                content: TableContent::Rows,
                ..
            } => "table-rows",
            Self::PackedTableBundle { .. } => "packed-table",
        }
    }

    /// Loose files in the order they are sent to the store.
    ///
    /// Bundle children are re-sorted by timestamp here regardless of the
    /// order they were stored in, recursively. The sort is stable so equal
    /// timestamps keep discovery order.
    #[must_use]
    pub fn ordered_leaves(&self) -> Vec<&Target> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Target>) {
        if !self.is_bundle() {
            leaves.push(self);
            return;
        }
        let mut children: Vec<&Target> = self.children().iter().collect();
        children.sort_by_key(|child| child.timestamp());
        for child in children {
            child.collect_leaves(leaves);
        }
    }

    /// Apply this target to the store.
    ///
    /// Returns the number of store operations issued. A failure part way
    /// through a bundle leaves the earlier children applied; nothing is
    /// rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Apply`] naming the file the store rejected or
    /// that could not be read.
    pub async fn sync<S: StoreClient>(&self, store: &S) -> SyncResult<usize> {
        let leaves = self.ordered_leaves();
        for leaf in &leaves {
            leaf.apply_leaf(store).await?;
        }
        Ok(leaves.len())
    }

    async fn apply_leaf<S: StoreClient>(&self, store: &S) -> SyncResult<()> {
        let path = self.path();
        debug!(path = %path.display(), kind = self.kind(), "Applying delta file");

        let result = match self {
            Self::SchemaFile { .. }
            | Self::TableFile {
                content: TableContent::Script,
                ..
            } => store.execute_script(path).await,
            Self::TableFile {
                table,
                content: TableContent::Rows,
                ..
            } => match read_parquet_rows(path) {
                Ok(rows) => store.load(table, rows).await,
                Err(e) => Err(e),
            },
            Self::PackedSchemaBundle { .. } | Self::PackedTableBundle { .. } => Ok(()),
        };

        result.map_err(|source| SyncError::Apply {
            path: path.to_path_buf(),
            source,
        })
    }
}
