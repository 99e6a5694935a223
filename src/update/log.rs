//! Append-only update log.
//!
//! Every step and outcome of an update cycle is appended to a line-oriented
//! UTF-8 file as `<RFC 3339 timestamp> <LEVEL> <message>`. The file is created
//! on first write and never rotated or truncated. Each entry is also emitted
//! as a `tracing` event, which is how `--verbose` echoes it to the console.
//!
//! Failing to write the log never fails the update.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Normal progress.
    Info,
    /// Degraded but recoverable (offline, download failed).
    Warn,
    /// A step failed.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Handle to the update log file.
#[derive(Debug, Clone)]
pub struct UpdateLog {
    path: PathBuf,
}

impl UpdateLog {
    /// Log appending to `path`. Nothing is written until the first entry.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an informational entry.
    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(target: "omx_launcher::update", "{message}");
        self.append(LogLevel::Info, message);
    }

    /// Append a warning entry.
    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!(target: "omx_launcher::update", "{message}");
        self.append(LogLevel::Warn, message);
    }

    /// Append an error entry.
    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::error!(target: "omx_launcher::update", "{message}");
        self.append(LogLevel::Error, message);
    }

    fn append(&self, level: LogLevel, message: &str) {
        let line = format_line(&chrono::Local::now().to_rfc3339(), level, message);
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "cannot write update log");
        }
    }
}

/// One log line. Embedded newlines are flattened so each entry stays on one line.
fn format_line(timestamp: &str, level: LogLevel, message: &str) -> String {
    let flat = message.replace(['\r', '\n'], " ");
    format!("{timestamp} {level} {flat}\n")
}
