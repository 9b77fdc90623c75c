//! Configuration management.
//!
//! Configuration lives in `config.yaml` inside the working directory given
//! by `--dir`. Every key is optional:
//!
//! ```yaml
//! delta_dir: delta
//! groonga:
//!   url: http://127.0.0.1:10041
//!   read_timeout: 60
//! log_dir: log
//! log_age: 7
//! log_max_size: 1048576
//! log_level: info
//! polling_interval: 60
//! ```
//!
//! Relative paths are resolved against the working directory, so the same
//! configuration works no matter where the process is started from.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file inside the working directory.
pub const CONFIG_FILE: &str = "config.yaml";

/// Name of the log file inside `log_dir`.
pub const LOG_FILE: &str = "groonga-sync.log";

/// Groonga connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroongaConfig {
    /// Base URL of the Groonga HTTP server.
    pub url: String,
    /// Per-request timeout in seconds. Negative disables the timeout.
    #[serde(deserialize_with = "number_or_string")]
    pub read_timeout: f64,
}

impl Default for GroongaConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:10041".to_string(),
            read_timeout: 60.0,
        }
    }
}

impl GroongaConfig {
    /// Request timeout, or `None` to wait indefinitely.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        if self.read_timeout < 0.0 {
            None
        } else {
            Duration::try_from_secs_f64(self.read_timeout).ok()
        }
    }
}

/// Minimum level written to the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            // Logger-style levels above error all mean "errors only".
            "error" | "fatal" | "unknown" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Contents of `config.yaml`, with defaults for missing keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub delta_dir: PathBuf,
    pub groonga: GroongaConfig,
    pub log_dir: PathBuf,
    pub log_age: usize,
    pub log_max_size: u64,
    pub log_level: LogLevel,
    #[serde(deserialize_with = "number_or_string")]
    pub polling_interval: f64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            delta_dir: PathBuf::from("delta"),
            groonga: GroongaConfig::default(),
            log_dir: PathBuf::from("log"),
            log_age: 7,
            log_max_size: 1024 * 1024,
            log_level: LogLevel::Info,
            polling_interval: 60.0,
        }
    }
}

/// Accept `60`, `60.5` or `"60"`.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("'{s}' is not a number"))),
    }
}

/// Resolved configuration for one working directory.
#[derive(Debug, Clone)]
pub struct Config {
    dir: PathBuf,
    file: ConfigFile,
}

impl Config {
    /// Load `config.yaml` from `dir`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// holds an invalid value.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let file = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => ConfigFile::default(),
            Ok(content) => serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => ConfigFile::default(),
            Err(e) => {
                return Err(Error::Config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let config = Self {
            dir: dir.to_path_buf(),
            file,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let interval = self.file.polling_interval;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(Error::Config(format!(
                "polling_interval must be a positive number of seconds, got {interval}"
            )));
        }
        if self.file.groonga.read_timeout.is_nan() {
            return Err(Error::Config("groonga.read_timeout is not a number".to_string()));
        }
        Ok(())
    }

    /// The working directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Values as read from the file.
    #[must_use]
    pub fn file(&self) -> &ConfigFile {
        &self.file
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    /// Root of the delta tree.
    #[must_use]
    pub fn delta_dir(&self) -> PathBuf {
        self.resolve(&self.file.delta_dir)
    }

    #[must_use]
    pub fn groonga(&self) -> &GroongaConfig {
        &self.file.groonga
    }

    /// Full path of the log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.file.log_dir).join(LOG_FILE)
    }

    #[must_use]
    pub fn log_age(&self) -> usize {
        self.file.log_age
    }

    #[must_use]
    pub fn log_max_size(&self) -> u64 {
        self.file.log_max_size
    }

    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        self.file.log_level
    }

    /// Delay between passes in watch mode.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        // Validated positive and finite on load.
        Duration::from_secs_f64(self.file.polling_interval)
    }
}
