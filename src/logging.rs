//! Logging setup for filedrop.
//!
//! Log lines always go to stdout. When `[logging] file` is set they are also
//! appended to that file, so restarts keep the history of reclaimed files.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{FiledropError, Result};

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Standard output only.
    Stdout,
    /// Standard output and an append-only log file.
    StdoutAndFile(PathBuf),
}

impl LogSink {
    /// Pick the sink described by the configuration; an empty file means stdout only.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let file = config.file.trim();
        if file.is_empty() {
            LogSink::Stdout
        } else {
            LogSink::StdoutAndFile(PathBuf::from(file))
        }
    }
}

/// Parse a level name, accepting `warning` as an alias. Unknown names map to INFO.
fn parse_level(level: &str) -> Level {
    let level = level.trim().to_lowercase();
    let name = if level == "warning" { "warn" } else { &level };
    name.parse().unwrap_or(Level::INFO)
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(parse_level(level).into())
}

/// Open `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber described by the configuration.
///
/// Returns the sink in use. Fails if the log file cannot be opened or a
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LogSink> {
    let sink = LogSink::from_config(config);
    let filter = env_filter(&config.level);
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let installed = match &sink {
        LogSink::Stdout => tracing_subscriber::registry()
            .with(fmt_layer.with_writer(std::io::stdout))
            .with(filter)
            .try_init(),
        LogSink::StdoutAndFile(path) => {
            let file = Arc::new(open_log_file(path)?);
            tracing_subscriber::registry()
                .with(
                    fmt_layer
                        .with_ansi(false)
                        .with_writer(std::io::stdout.and(file)),
                )
                .with(filter)
                .try_init()
        }
    };
    installed.map_err(|e| FiledropError::Config(format!("logging setup failed: {e}")))?;
    Ok(sink)
}

/// Stdout-only logging, used when [`init`] fails. Does nothing if a
/// subscriber is already installed.
pub fn init_console_only(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(env_filter(level))
        .try_init();
}
