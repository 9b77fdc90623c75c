//! Error types for groonga-sync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (6=sync, 7=config, 8=I/O)
//! - Retryability flags for supervisors deciding whether to run another pass
//! - Context-aware recovery hints
//! - Structured JSON output for `--json` consumers

use thiserror::Error;

use crate::store::StoreError;
use crate::sync::SyncError;

/// Result type alias for groonga-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Supervisors match on the string; shell scripts on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Sync (exit 6)
    SyncError,
    StoreError,
    CheckpointError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::SyncError => "SYNC_ERROR",
            Self::StoreError => "STORE_ERROR",
            Self::CheckpointError => "CHECKPOINT_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::SyncError | Self::StoreError | Self::CheckpointError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether running another pass unchanged may succeed.
    ///
    /// True for failures talking to the store or applying a delta, which
    /// the next pass retries from the checkpoint.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SyncError | Self::StoreError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in groonga-sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Sync(SyncError::Checkpoint(_)) => ErrorCode::CheckpointError,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::Store(StoreError::InvalidUrl { .. }) | Self::Config(_) => ErrorCode::ConfigError,
            Self::Store(_) => ErrorCode::StoreError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Sync(SyncError::Apply { path, source }) => {
                let mut hint = format!(
                    "The checkpoint stops before {}; it is retried on the next pass.",
                    path.display()
                );
                if matches!(source, StoreError::Http { .. }) {
                    hint.push_str("\n  Check that Groonga is reachable at `groonga.url`.");
                }
                Some(hint)
            }

            Self::Sync(SyncError::Checkpoint(_)) => Some(
                "Fix or remove status.yaml. Removing it replays every delta from the beginning."
                    .to_string(),
            ),

            Self::Store(StoreError::InvalidUrl { .. }) => Some(
                "Set `groonga.url` in config.yaml to an http:// or https:// URL".to_string(),
            ),

            Self::Store(StoreError::Http { .. }) => {
                Some("Check that Groonga is reachable at `groonga.url`.".to_string())
            }

            Self::Config(_) => {
                Some("Check config.yaml in the directory given by --dir".to_string())
            }

            Self::Sync(SyncError::Io { .. })
            | Self::Store(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::Config("x".into()).exit_code(), 7);
        assert_eq!(Error::Other("x".into()).exit_code(), 1);
        assert_eq!(
            Error::Sync(SyncError::Checkpoint("bad".into())).error_code(),
            ErrorCode::CheckpointError
        );
        assert_eq!(
            Error::Sync(SyncError::Checkpoint("bad".into())).exit_code(),
            6
        );
    }

    #[test]
    fn test_invalid_url_is_a_config_error() {
        let err = Error::from(StoreError::InvalidUrl {
            url: "nope".into(),
            message: "relative URL without a base".into(),
        });
        assert_eq!(err.error_code(), ErrorCode::ConfigError);
        assert!(err.hint().unwrap().contains("groonga.url"));
    }

    #[test]
    fn test_structured_json_for_apply_failure() {
        let err = Error::from(SyncError::Apply {
            path: PathBuf::from("delta/schema/2024-01-01-00-00-00-000000000.grn"),
            source: StoreError::Command {
                command: "table_create".into(),
                code: -22,
                message: "already used name".into(),
            },
        });

        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "SYNC_ERROR");
        assert_eq!(json["error"]["exit_code"], 6);
        assert_eq!(json["error"]["retryable"], true);
        assert!(
            json["error"]["hint"]
                .as_str()
                .unwrap()
                .contains("2024-01-01-00-00-00-000000000.grn")
        );
    }
}
