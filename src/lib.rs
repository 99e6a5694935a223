//! OMX launcher: keeps the OMX mail client's source files current and starts it.
//!
//! # Architecture
//!
//! - **Config**: TOML launcher settings ([`config`], [`launcher_dirs`])
//! - **Self-update**: probe, fetch to staging, back up, replace atomically,
//!   verify, commit or roll back ([`update`])
//! - **Presentation**: progress spinner and console logging ([`progress`],
//!   [`logging`])

pub mod config;
pub mod error;
pub mod launcher_dirs;
pub mod logging;
pub mod progress;
pub mod update;

pub use config::{LauncherConfig, UpdateOptions};
pub use error::{LauncherError, Result};
pub use progress::{ProgressCallback, ProgressEvent};
pub use update::{UpdateOutcome, Updater, run_update};
