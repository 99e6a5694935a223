//! Isolated smoke test of a candidate main file.
//!
//! The candidate is evaluated by the configured interpreter in a child
//! process, so nothing it does at load time can touch the launcher's own
//! state. Only success or failure is captured; this detects load-time
//! faults, it does not check behaviour.

use crate::config::{SmokeTestConfig, expand_file_placeholder};
use crate::error::{LauncherError, Result};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// How often the child is polled while waiting for it to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Longest stderr excerpt carried in a failure message.
const STDERR_EXCERPT_BYTES: u64 = 2048;

/// Load-time check of a candidate file.
pub trait SmokeTest: Send + Sync {
    /// Attempt to load `file` in isolation.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError::SmokeTest`] if loading fails.
    fn check(&self, file: &Path) -> Result<()>;
}

/// Smoke test that runs an interpreter on the candidate in a child process.
#[derive(Debug, Clone)]
pub struct ProcessSmokeTest {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl ProcessSmokeTest {
    /// Build from config. The child runs in `working_dir` when given, so
    /// sibling modules resolve the same way they will at launch.
    pub fn new(config: &SmokeTestConfig, working_dir: Option<PathBuf>) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            working_dir,
        }
    }
}

impl SmokeTest for ProcessSmokeTest {
    fn check(&self, file: &Path) -> Result<()> {
        let stderr_file = tempfile::tempfile()
            .map_err(|e| LauncherError::SmokeTest(format!("cannot capture stderr: {e}")))?;
        let stderr_writer = stderr_file
            .try_clone()
            .map_err(|e| LauncherError::SmokeTest(format!("cannot capture stderr: {e}")))?;

        let mut command = Command::new(&self.program);
        command
            .args(expand_file_placeholder(&self.args, file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_writer));
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            LauncherError::SmokeTest(format!("cannot run {}: {e}", self.program))
        })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    terminate(&mut child);
                    return Err(LauncherError::SmokeTest(format!(
                        "{} did not finish loading within {}s",
                        file.display(),
                        self.timeout.as_secs()
                    )));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    terminate(&mut child);
                    return Err(LauncherError::SmokeTest(format!("cannot wait for child: {e}")));
                }
            }
        };

        if status.success() {
            tracing::info!(file = %file.display(), "smoke test passed");
            return Ok(());
        }

        Err(LauncherError::SmokeTest(format!(
            "{} failed to load ({status}): {}",
            file.display(),
            stderr_tail(stderr_file)
        )))
    }
}

/// Kill `child` and reap it.
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn stderr_tail(mut file: std::fs::File) -> String {
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let start = len.saturating_sub(STDERR_EXCERPT_BYTES);
    let mut buf = Vec::new();
    if file.seek(SeekFrom::Start(start)).is_err() || file.read_to_end(&mut buf).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).trim().to_owned()
}

#[cfg(all(test, unix))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::FILE_PLACEHOLDER;

    fn sh_smoke_test(timeout_secs: u64) -> ProcessSmokeTest {
        let config = SmokeTestConfig {
            enabled: true,
            program: "sh".to_owned(),
            args: vec![FILE_PLACEHOLDER.to_owned()],
            timeout_secs,
        };
        ProcessSmokeTest::new(&config, None)
    }

    #[test]
    fn loadable_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.sh");
        std::fs::write(&file, "x=1\n").unwrap();
        assert!(sh_smoke_test(10).check(&file).is_ok());
    }

    #[test]
    fn failing_file_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.sh");
        std::fs::write(&file, "echo 'boom at import' >&2\nexit 3\n").unwrap();

        let err = sh_smoke_test(10).check(&file).unwrap_err();
        assert!(matches!(err, LauncherError::SmokeTest(_)));
        assert!(err.to_string().contains("boom at import"), "{err}");
    }

    #[test]
    fn hanging_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.sh");
        std::fs::write(&file, "sleep 30\n").unwrap();

        let started = Instant::now();
        let err = sh_smoke_test(1).check(&file).unwrap_err();
        assert!(err.to_string().contains("within 1s"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn terminate_reaps_the_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        terminate(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn missing_interpreter_fails() {
        let config = SmokeTestConfig {
            program: "/nonexistent/omx-interpreter".to_owned(),
            ..SmokeTestConfig::default()
        };
        let result = ProcessSmokeTest::new(&config, None).check(Path::new("main.py"));
        assert!(matches!(result, Err(LauncherError::SmokeTest(_))));
    }

    #[test]
    fn runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sibling.sh"), "ok=1\n").unwrap();
        let file = dir.path().join("main.sh");
        std::fs::write(&file, ". ./sibling.sh\n").unwrap();

        let config = SmokeTestConfig {
            enabled: true,
            program: "sh".to_owned(),
            args: vec![FILE_PLACEHOLDER.to_owned()],
            timeout_secs: 10,
        };
        let smoke = ProcessSmokeTest::new(&config, Some(dir.path().to_path_buf()));
        assert!(smoke.check(&file).is_ok());
    }
}
