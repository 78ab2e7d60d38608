//! Logging infrastructure for the Teller support agent.
//!
//! This module initializes the tracing subscriber for structured logging.
//! Human-readable logs go to stderr; when a log file is configured the same
//! events are also appended to a daily-rolling file in the logs directory.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Options for [`init_logging`].
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Log level override (e.g., "debug", "info", "teller_agent=trace")
    pub level: Option<String>,

    /// Disable colored output
    pub no_color: bool,

    /// Log file; the file name becomes the prefix of rotated files
    pub file: Option<PathBuf>,

    /// Number of rotated files kept
    pub max_files: usize,
}

/// Keeps the background file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the tracing subscriber.
///
/// This sets up structured logging with:
/// - Output to stderr (stdout is reserved for command output)
/// - Environment-based filtering (provided level, else RUST_LOG, else info)
/// - Optional ANSI color control
/// - Optional daily-rolling log file with bounded retention
///
/// # Example
/// ```no_run
/// use teller_core::logging::{init_logging, LoggingOptions};
///
/// let _guard = init_logging(&LoggingOptions::default()).expect("Failed to initialize logging");
/// ```
pub fn init_logging(options: &LoggingOptions) -> AppResult<LogGuard> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = options.level.as_deref().unwrap_or(&default_level);

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!options.no_color && supports_color());

    let (file_layer, file_guard) = match options.file.as_deref() {
        Some(path) => {
            let appender = rolling_appender(path, options.max_files)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(LogGuard { _file: file_guard })
}

/// Build a daily-rolling appender for `path`.
///
/// `logs/app.log` rolls into `logs/app.YYYY-MM-DD.log`.
fn rolling_appender(
    path: &Path,
    max_files: usize,
) -> AppResult<tracing_appender::rolling::RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Config(format!("Failed to create log directory {:?}: {}", dir, e)))?;

    let (prefix, suffix) = split_file_name(path);

    let mut builder = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix);

    if let Some(suffix) = suffix {
        builder = builder.filename_suffix(suffix);
    }

    if max_files > 0 {
        builder = builder.max_log_files(max_files);
    }

    builder
        .build(dir)
        .map_err(|e| AppError::Config(format!("Failed to open log file {:?}: {}", path, e)))
}

/// Split `app.log` into (`app`, Some(`log`)).
fn split_file_name(path: &Path) -> (String, Option<String>) {
    let prefix = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "app".to_string());
    let suffix = path
        .extension()
        .map(|s| s.to_string_lossy().to_string());
    (prefix, suffix)
}

/// Check if the terminal supports color output.
fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}
