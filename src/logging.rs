//! Tracing setup.
//!
//! Two sinks:
//! - stderr, controlled by `-v`/`-q` and `RUST_LOG`
//! - `<log_dir>/groonga-sync.log`, controlled by `log_level`, shifted to
//!   `groonga-sync.log.1`, `.2`, ... once it grows past `log_max_size`

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{Config, LogLevel};
use crate::error::{Error, Result};

/// Timestamp format of log file lines.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f";

/// HTTP internals are noisy below info.
const QUIET_DEPENDENCIES: &str = "hyper=info,hyper_util=info,reqwest=info,h2=info";

/// Install the global subscriber.
///
/// `config` is `None` when the configuration could not be loaded; only
/// stderr logging is set up in that case.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init(verbose: u8, quiet: bool, config: Option<&Config>) -> Result<()> {
    let stderr_layer = (!quiet).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .without_time()
            .with_filter(stderr_filter(verbose))
    });

    let file_layer = match config {
        Some(config) => {
            let file = RotatingFile::open(
                config.log_path(),
                config.log_max_size(),
                config.log_age(),
            )
            .map_err(|e| {
                Error::Config(format!(
                    "failed to open log file {}: {e}",
                    config.log_path().display()
                ))
            })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_timer(LocalTime)
                    .with_filter(EnvFilter::new(level_directive(config.log_level()))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("failed to initialize logging: {e}")))
}

fn stderr_filter(verbose: u8) -> EnvFilter {
    // Honor RUST_LOG if set, otherwise use verbosity flag
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
        EnvFilter::new(level_directive(level))
    }
}

fn level_directive(level: LogLevel) -> String {
    match level {
        LogLevel::Trace | LogLevel::Debug => format!("{level},{QUIET_DEPENDENCIES}"),
        LogLevel::Info | LogLevel::Warn | LogLevel::Error => level.to_string(),
    }
}

/// Local wall-clock time with nanoseconds.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format(TIME_FORMAT))
    }
}

/// Append-only log file that shifts itself once it exceeds `max_size`.
///
/// With `age == 0` the file grows without limit.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    age: usize,
    file: File,
    size: u64,
}

impl RotatingFile {
    /// Open (or create) the log file, creating its directory if needed.
    ///
    /// An existing file already over the limit is shifted first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn open(path: PathBuf, max_size: u64, age: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let size = match fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        let mut rotating = Self {
            file: open_append(&path)?,
            path,
            max_size,
            age,
            size,
        };
        if rotating.age > 0 && rotating.size >= rotating.max_size && rotating.size > 0 {
            rotating.rotate()?;
        }
        Ok(rotating)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        shift_generations(&self.path, self.age)?;
        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let incoming = u64::try_from(buf.len()).unwrap_or(u64::MAX);
        if self.age > 0 && self.size > 0 && self.size.saturating_add(incoming) > self.max_size {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size = self
            .size
            .saturating_add(u64::try_from(written).unwrap_or(u64::MAX));
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn generation(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Move `path` to `path.1`, `path.1` to `path.2`, ..., dropping `path.<age>`.
///
/// # Errors
///
/// Returns an error if a generation cannot be renamed or removed.
pub fn shift_generations(path: &Path, age: usize) -> io::Result<()> {
    if age == 0 {
        return Ok(());
    }
    match fs::remove_file(generation(path, age)) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    for n in (1..age).rev() {
        let from = generation(path, n);
        if from.exists() {
            fs::rename(&from, generation(path, n + 1))?;
        }
    }
    if path.exists() {
        fs::rename(path, generation(path, 1))?;
    }
    Ok(())
}
