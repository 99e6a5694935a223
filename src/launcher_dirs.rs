//! Centralized directory paths for the OMX launcher.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Base (working files, staging, backups, log) | `~/Library/Application Support/omx/` | `~/.local/share/omx/` |
//! | Config | `~/Library/Application Support/omx/` | `~/.config/omx/` |
//!
//! # Environment Overrides
//!
//! - `OMX_HOME` overrides [`base_dir`]
//! - `OMX_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Launcher base directory.
///
/// Holds the working source files, the dependency manifest, the staging
/// directory, backup slots, and the update log.
///
/// Resolves to `dirs::data_dir()/omx/` by default. Override with the
/// `OMX_HOME` environment variable.
#[must_use]
pub fn base_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("OMX_HOME") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("omx"))
        .unwrap_or_else(|| PathBuf::from("/tmp/omx"))
}

/// Launcher config directory.
///
/// Resolves to `dirs::config_dir()/omx/` by default. Override with the
/// `OMX_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("OMX_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("omx"))
        .unwrap_or_else(|| PathBuf::from("/tmp/omx-config"))
}

/// Launcher config file path (`config_dir()/launcher.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("launcher.toml")
}
