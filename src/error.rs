//! Error types for the OMX launcher.

/// Top-level error type for the launcher and its self-updater.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (connectivity, DNS, TLS, non-2xx status).
    #[error("network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Self-update error (staging, backup, apply, restore).
    #[error("update error: {0}")]
    Update(String),

    /// A published digest did not match the applied file.
    #[error("verification error: {0}")]
    Verification(String),

    /// The candidate main file failed to load in isolation.
    #[error("smoke test error: {0}")]
    SmokeTest(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LauncherError>;
