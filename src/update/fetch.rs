//! Connectivity probe and remote file fetching.
//!
//! The updater talks to the origin only through the [`Fetcher`] trait so the
//! update cycle can run against an in-memory origin in tests. [`HttpFetcher`]
//! is the production implementation on a blocking `ureq` agent with fixed
//! short timeouts. There are no retries: a failed request is final for the
//! current cycle.

use super::applier;
use crate::config::NetworkConfig;
use crate::error::{LauncherError, Result};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Upper bound on a fetched body. Source files and manifests are small.
pub const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

/// Access to the remote origin.
pub trait Fetcher: Send + Sync {
    /// Returns `true` if `url` answered at all (any HTTP status).
    fn probe(&self, url: &str) -> bool;

    /// Fetch the full body of `url`.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError::Network`] on transport failure or a non-2xx status.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetch `url` into `dest`, returning the bytes written.
///
/// `dest` is replaced atomically, so a failed write never leaves a
/// truncated staged copy behind.
///
/// # Errors
///
/// Returns an error if the fetch fails or `dest` cannot be written.
pub fn fetch_to(fetcher: &dyn Fetcher, url: &str, dest: &Path) -> Result<Vec<u8>> {
    let bytes = fetcher.fetch(url)?;
    applier::atomic_write(dest, &bytes)?;
    Ok(bytes)
}

/// HTTP(S) fetcher backed by `ureq`.
pub struct HttpFetcher {
    probe_agent: ureq::Agent,
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Build a fetcher from the network settings.
    pub fn new(config: &NetworkConfig) -> Self {
        let probe_timeout = Duration::from_secs(config.probe_timeout_secs);
        let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);
        Self {
            probe_agent: ureq::AgentBuilder::new()
                .timeout(probe_timeout)
                .user_agent(&config.user_agent)
                .build(),
            agent: ureq::AgentBuilder::new()
                .timeout_connect(fetch_timeout)
                .timeout_read(fetch_timeout)
                .user_agent(&config.user_agent)
                .build(),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn probe(&self, url: &str) -> bool {
        match self.probe_agent.head(url).call() {
            Ok(_) | Err(ureq::Error::Status(..)) => true,
            Err(ureq::Error::Transport(e)) => {
                tracing::info!(url, error = %e, "connectivity probe failed");
                false
            }
        }
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => {
                LauncherError::Network(format!("GET {url} returned HTTP {code}"))
            }
            ureq::Error::Transport(t) => LauncherError::Network(format!("GET {url} failed: {t}")),
        })?;

        let mut body = Vec::new();
        resp.into_reader()
            .take(MAX_BODY_BYTES + 1)
            .read_to_end(&mut body)
            .map_err(|e| LauncherError::Network(format!("GET {url} read error: {e}")))?;
        if body.len() as u64 > MAX_BODY_BYTES {
            return Err(LauncherError::Network(format!(
                "GET {url}: body exceeds {MAX_BODY_BYTES} bytes"
            )));
        }
        Ok(body)
    }
}
