//! Progress events for the update cycle and the console spinner.
//!
//! The updater reports progress through a callback so the cycle itself stays
//! free of presentation concerns. The launcher binary feeds those events into
//! an indicatif spinner, whose steady-tick thread is the only auxiliary thread
//! in the process.

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::time::Duration;

/// Spinner redraw interval.
const TICK_INTERVAL: Duration = Duration::from_millis(120);

/// Progress events emitted during an update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Checking connectivity to the origin.
    Probing,
    /// Downloading a remote file to staging.
    Fetching {
        /// File name being fetched.
        file_name: String,
    },
    /// Backing up and replacing a working file.
    Applying {
        /// File name being applied.
        file_name: String,
    },
    /// Checking a published digest or smoke testing.
    Verifying {
        /// File name being verified.
        file_name: String,
    },
    /// Restoring working files after a failed verification.
    RollingBack,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probing => write!(f, "Checking connection"),
            Self::Fetching { file_name } => write!(f, "Downloading {file_name}"),
            Self::Applying { file_name } => write!(f, "Installing {file_name}"),
            Self::Verifying { file_name } => write!(f, "Verifying {file_name}"),
            Self::RollingBack => write!(f, "Rolling back"),
        }
    }
}

/// Callback type for receiving progress events.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Console spinner shown while the update cycle runs.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Start spinning with `message`. A silent spinner draws nothing and
    /// starts no thread.
    pub fn start(message: &str, silent: bool) -> Self {
        if silent {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_owned());
        bar.enable_steady_tick(TICK_INTERVAL);
        Self { bar }
    }

    /// Callback that mirrors progress events into the spinner message.
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |event| bar.set_message(event.to_string()))
    }

    /// Handle to the underlying bar, for output that must suspend it.
    pub fn progress_bar(&self) -> ProgressBar {
        self.bar.clone()
    }

    /// Stop the tick thread and clear the line, so later output does not
    /// interleave with the spinner.
    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}
