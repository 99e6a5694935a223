//! The update cycle.
//!
//! 1. Probe connectivity. Offline without a local manifest ends the cycle
//!    with [`UpdateOutcome::SkippedNoNetwork`] before touching the filesystem
//!    (the log excepted).
//! 2. Sync the manifest when its normalised content changed.
//! 3. Download every source file to staging, independently.
//! 4. Decide per file whether to apply, back up the working copy, then
//!    replace it atomically.
//! 5. Verify every applied file (published digest, smoke test for the main
//!    file). Any failure restores every applied file.

use super::applier;
use super::fetch::{Fetcher, HttpFetcher, fetch_to};
use super::integrity::{self, IntegrityResult};
use super::log::UpdateLog;
use super::manifest;
use super::smoke::{ProcessSmokeTest, SmokeTest};
use crate::config::{FileRole, LauncherConfig, SourceFile, UpdateOptions};
use crate::progress::{ProgressCallback, ProgressEvent};
use std::fmt;
use std::path::{Path, PathBuf};

/// Terminal result of an update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing changed on disk.
    NoUpdateNeeded,
    /// At least one working file was replaced and everything verified.
    Updated,
    /// Offline and no local manifest to fall back on.
    SkippedNoNetwork,
    /// Verification failed; every applied file was restored.
    RolledBack,
    /// Verification failed and at least one file could not be restored.
    /// The working tree may hold updated but unverified content.
    RollbackFailed,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUpdateNeeded => write!(f, "no_update_needed"),
            Self::Updated => write!(f, "updated"),
            Self::SkippedNoNetwork => write!(f, "skipped_no_network"),
            Self::RolledBack => write!(f, "rolled_back"),
            Self::RollbackFailed => write!(f, "rollback_failed"),
        }
    }
}

/// What to do with one source file this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyDecision {
    /// Replace the working copy with the staged copy.
    Apply,
    /// Downloaded content equals the working copy.
    Unchanged,
    /// Not downloaded; keep using the working copy.
    KeepExisting,
    /// Not downloaded and no working copy either.
    Unavailable,
}

/// A working file replaced during this cycle.
#[derive(Debug)]
struct AppliedFile {
    file_name: String,
    url: String,
    role: FileRole,
    working: PathBuf,
    /// `None` when the working file did not exist before.
    backup: Option<PathBuf>,
}

/// Runs update cycles against one working tree.
pub struct Updater {
    config: LauncherConfig,
    options: UpdateOptions,
    fetcher: Box<dyn Fetcher>,
    smoke_test: Option<Box<dyn SmokeTest>>,
    progress: Option<ProgressCallback>,
}

impl Updater {
    /// Updater using HTTP and the configured smoke-test interpreter.
    pub fn new(config: LauncherConfig, options: UpdateOptions) -> Self {
        let fetcher: Box<dyn Fetcher> = Box::new(HttpFetcher::new(&config.network));
        let smoke_test: Option<Box<dyn SmokeTest>> = if config.smoke_test.enabled {
            Some(Box::new(ProcessSmokeTest::new(
                &config.smoke_test,
                Some(config.base_dir()),
            )))
        } else {
            None
        };
        Self {
            config,
            options,
            fetcher,
            smoke_test,
            progress: None,
        }
    }

    /// Replace the origin client.
    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace (or disable, with `None`) the smoke test.
    pub fn with_smoke_test(mut self, smoke_test: Option<Box<dyn SmokeTest>>) -> Self {
        self.smoke_test = smoke_test;
        self
    }

    /// Receive progress events.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(cb) = &self.progress {
            cb(event);
        }
    }

    /// Run one update cycle. Never fails: every expected error is logged and
    /// folded into the outcome.
    pub fn run(&self) -> UpdateOutcome {
        let log = UpdateLog::new(self.config.log_path());
        let force = self.options.force;
        log.info(format!("update cycle started (force={force})"));

        self.report(ProgressEvent::Probing);
        let online = self.fetcher.probe(&self.config.network.probe_url);
        let manifest_path = self.config.manifest_path();

        if !online {
            if !manifest_path.exists() {
                log.warn("no connectivity and no local manifest; skipping update");
                return UpdateOutcome::SkippedNoNetwork;
            }
            log.warn("no connectivity; continuing with local manifest");
        }

        let staging = self.config.staging_dir();
        let staging_ready = online && self.prepare_staging(&staging, &log);

        let manifest_changed = staging_ready && self.sync_manifest(&staging, &manifest_path, &log);

        let mut applied = Vec::new();
        for source in &self.config.sources.files {
            let downloaded = staging_ready && self.download_source(source, &staging, &log);
            if let Some(file) = self.apply_source(source, &staging, downloaded, &log) {
                applied.push(file);
            }
        }

        if applied.is_empty() {
            if manifest_changed {
                log.info("update cycle finished: manifest updated");
                return UpdateOutcome::Updated;
            }
            log.info("update cycle finished: no update needed");
            return UpdateOutcome::NoUpdateNeeded;
        }

        if self.verify(&applied, &log) {
            let names: Vec<&str> = applied.iter().map(|f| f.file_name.as_str()).collect();
            log.info(format!("update cycle committed: {}", names.join(", ")));
            return UpdateOutcome::Updated;
        }

        self.rollback(&applied, &log)
    }

    fn prepare_staging(&self, staging: &Path, log: &UpdateLog) -> bool {
        match std::fs::create_dir_all(staging) {
            Ok(()) => true,
            Err(e) => {
                log.error(format!(
                    "cannot create staging directory {}: {e}",
                    staging.display()
                ));
                false
            }
        }
    }

    /// Returns `true` if the working manifest was replaced.
    fn sync_manifest(&self, staging: &Path, working: &Path, log: &UpdateLog) -> bool {
        let remote = &self.config.sources.manifest;
        self.report(ProgressEvent::Fetching {
            file_name: remote.file_name.clone(),
        });

        let bytes = match fetch_to(&*self.fetcher, &remote.url, &staging.join(&remote.file_name))
        {
            Ok(bytes) => bytes,
            Err(e) => {
                log.warn(format!("manifest download failed: {e}"));
                return false;
            }
        };

        let remote_digest = integrity::sha256_hex(&manifest::normalize(&bytes));
        let local_digest = std::fs::read(working)
            .ok()
            .map(|local| integrity::sha256_hex(&manifest::normalize(&local)));
        if local_digest.as_deref() == Some(remote_digest.as_str()) {
            log.info("manifest unchanged");
            return false;
        }

        match applier::atomic_write(working, &bytes) {
            Ok(()) => {
                let count = manifest::parse_requirements(&String::from_utf8_lossy(&bytes)).len();
                log.info(format!("manifest updated ({count} packages)"));
                true
            }
            Err(e) => {
                log.error(format!("manifest update failed: {e}"));
                false
            }
        }
    }

    /// Returns `true` if the staged copy now holds fresh remote content.
    fn download_source(&self, source: &SourceFile, staging: &Path, log: &UpdateLog) -> bool {
        self.report(ProgressEvent::Fetching {
            file_name: source.file_name.clone(),
        });
        match fetch_to(&*self.fetcher, &source.url, &staging.join(&source.file_name)) {
            Ok(bytes) => {
                log.info(format!("downloaded {} ({} bytes)", source.file_name, bytes.len()));
                true
            }
            Err(e) => {
                log.warn(format!("download of {} failed: {e}", source.file_name));
                false
            }
        }
    }

    fn decide(&self, downloaded: bool, staged: &Path, working: &Path) -> ApplyDecision {
        if downloaded {
            if self.options.force {
                return ApplyDecision::Apply;
            }
            let staged_digest = integrity::sha256_file_opt(staged);
            let working_digest = integrity::sha256_file_opt(working);
            if staged_digest.is_some() && staged_digest == working_digest {
                return ApplyDecision::Unchanged;
            }
            return ApplyDecision::Apply;
        }
        if self.options.force && staged.is_file() {
            return ApplyDecision::Apply;
        }
        if working.exists() {
            ApplyDecision::KeepExisting
        } else {
            ApplyDecision::Unavailable
        }
    }

    fn apply_source(
        &self,
        source: &SourceFile,
        staging: &Path,
        downloaded: bool,
        log: &UpdateLog,
    ) -> Option<AppliedFile> {
        let name = &source.file_name;
        let staged = staging.join(name);
        let working = self.config.base_dir().join(name);

        match self.decide(downloaded, &staged, &working) {
            ApplyDecision::Apply => {}
            ApplyDecision::Unchanged => {
                log.info(format!("{name} unchanged"));
                return None;
            }
            ApplyDecision::KeepExisting => {
                log.info(format!("{name}: keeping existing working copy"));
                return None;
            }
            ApplyDecision::Unavailable => {
                log.error(format!("{name}: no download and no working copy"));
                return None;
            }
        }

        self.report(ProgressEvent::Applying {
            file_name: name.clone(),
        });

        let bytes = match std::fs::read(&staged) {
            Ok(bytes) => bytes,
            Err(e) => {
                log.error(format!("{name}: cannot read staged copy: {e}"));
                return None;
            }
        };

        let backup = if working.exists() {
            match applier::backup(&working, &self.config.paths.backup_suffix) {
                Ok(slot) => Some(slot),
                Err(e) => {
                    log.error(format!("{name}: {e}; not applying"));
                    return None;
                }
            }
        } else {
            None
        };

        if let Err(e) = applier::atomic_write(&working, &bytes) {
            log.error(format!("{name}: {e}"));
            return None;
        }

        log.info(format!("{name} applied ({} bytes)", bytes.len()));
        Some(AppliedFile {
            file_name: name.clone(),
            url: source.url.clone(),
            role: source.role,
            working,
            backup,
        })
    }

    /// Returns `true` if every applied file passed every check.
    fn verify(&self, applied: &[AppliedFile], log: &UpdateLog) -> bool {
        let mut all_passed = true;
        for file in applied {
            self.report(ProgressEvent::Verifying {
                file_name: file.file_name.clone(),
            });

            let digest_check =
                integrity::verify_published(&*self.fetcher, &file.url, &file.working);
            match digest_check.ensure_passed(&file.file_name) {
                Ok(()) if digest_check == IntegrityResult::NoDigest => {
                    log.info(format!("{}: no published digest", file.file_name));
                }
                Ok(()) => log.info(format!("{}: published digest matches", file.file_name)),
                Err(e) => {
                    log.error(e.to_string());
                    all_passed = false;
                }
            }

            if file.role == FileRole::Main {
                if let Some(smoke) = &self.smoke_test {
                    match smoke.check(&file.working) {
                        Ok(()) => log.info(format!("{}: smoke test passed", file.file_name)),
                        Err(e) => {
                            log.error(format!("{}: {e}", file.file_name));
                            all_passed = false;
                        }
                    }
                }
            }
        }
        all_passed
    }

    fn rollback(&self, applied: &[AppliedFile], log: &UpdateLog) -> UpdateOutcome {
        self.report(ProgressEvent::RollingBack);
        log.warn("verification failed; rolling back");

        let mut failed = false;
        for file in applied {
            match applier::restore(&file.working, file.backup.as_deref()) {
                Ok(()) => log.info(format!("{} restored", file.file_name)),
                Err(e) => {
                    log.error(format!("{}: restore failed: {e}", file.file_name));
                    failed = true;
                }
            }
        }

        if failed {
            log.error("rollback incomplete; working tree may hold unverified files");
            UpdateOutcome::RollbackFailed
        } else {
            log.info("rollback complete");
            UpdateOutcome::RolledBack
        }
    }
}

/// Run one update cycle with the production fetcher and smoke test.
pub fn run_update(config: &LauncherConfig, options: UpdateOptions) -> UpdateOutcome {
    Updater::new(config.clone(), options).run()
}
