//! Self-update of the launcher's working files.
//!
//! Keeps the source files and the dependency manifest in sync with the
//! remote origin without ever leaving the working tree broken: downloads
//! land in staging, working files are backed up and replaced atomically,
//! and a failed digest check or smoke test restores every replaced file.

pub mod applier;
pub mod cycle;
pub mod fetch;
pub mod integrity;
pub mod log;
pub mod manifest;
pub mod smoke;

pub use cycle::{UpdateOutcome, Updater, run_update};
pub use fetch::{Fetcher, HttpFetcher};
pub use smoke::{ProcessSmokeTest, SmokeTest};
