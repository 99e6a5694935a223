//! Content digests and published-checksum verification.
//!
//! Change detection compares SHA-256 digests of file contents, never
//! timestamps. After an apply, the updater looks for a digest published next
//! to the source URL (`<url>.sha256`, then `<url>.sha256sum`). A published
//! digest that disagrees with the applied file fails verification; when no
//! digest is published the check passes. This is a best-effort check, not
//! an integrity guarantee.
//!
//! # Example
//!
//! ```rust
//! use omx_launcher::update::integrity::{extract_digest, sha256_hex};
//!
//! let digest = sha256_hex(b"print('hi')\n");
//! let published = format!("{digest}  main.py\n");
//! assert_eq!(extract_digest(&published).as_deref(), Some(digest.as_str()));
//! ```

use super::fetch::Fetcher;
use crate::error::{LauncherError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use tracing::{info, warn};

/// URL suffixes tried, in order, when looking for a published digest.
pub const DIGEST_SUFFIXES: &[&str] = &[".sha256", ".sha256sum"];

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Result of checking an applied file against its published digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityResult {
    /// A published digest was found and matches the local file.
    Ok,
    /// A published digest was found and does not match, or the local file
    /// could not be read.
    Mismatch {
        /// Published digest.
        expected: String,
        /// Digest of the local file (empty if unreadable).
        actual: String,
    },
    /// No digest is published at any conventional suffix.
    NoDigest,
}

impl IntegrityResult {
    /// Whether the check counts as passing.
    pub fn passed(&self) -> bool {
        !matches!(self, Self::Mismatch { .. })
    }

    /// Turn a failing check on `file_name` into an error.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError::Verification`] for [`IntegrityResult::Mismatch`].
    pub fn ensure_passed(&self, file_name: &str) -> Result<()> {
        if self.passed() {
            return Ok(());
        }
        let detail = match self {
            Self::Mismatch { expected, actual } if actual.is_empty() => {
                format!("expected {expected}, file unreadable")
            }
            Self::Mismatch { expected, actual } => format!("expected {expected}, got {actual}"),
            _ => self.to_string(),
        };
        Err(LauncherError::Verification(format!(
            "{file_name}: digest mismatch ({detail})"
        )))
    }
}

impl fmt::Display for IntegrityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Mismatch { .. } => write!(f, "mismatch"),
            Self::NoDigest => write!(f, "no_digest"),
        }
    }
}

/// SHA-256 hex digest of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hex digest of a file's contents.
///
/// Reads the file in 64 KiB chunks.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65_536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of the file at `path`, or `None` when it is missing or unreadable.
pub fn sha256_file_opt(path: &Path) -> Option<String> {
    sha256_file(path).ok()
}

/// Find the first standalone 64-hex-character token in `text`.
///
/// Accepts the usual `sha256sum` output (`<digest>  <name>`), a bare digest,
/// or a digest embedded in other text. The result is lowercased.
pub fn extract_digest(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_hexdigit())
        .find(|token| token.len() == DIGEST_HEX_LEN)
        .map(str::to_ascii_lowercase)
}

/// Candidate digest URLs for a source URL.
pub fn digest_urls(url: &str) -> Vec<String> {
    DIGEST_SUFFIXES
        .iter()
        .map(|suffix| format!("{url}{suffix}"))
        .collect()
}

/// Fetch the digest published for `url`, trying each conventional suffix.
///
/// Network failures and bodies without a digest token are treated as "not
/// published at this suffix".
pub fn fetch_published_digest(fetcher: &dyn Fetcher, url: &str) -> Option<String> {
    for candidate in digest_urls(url) {
        match fetcher.fetch(&candidate) {
            Ok(body) => {
                if let Some(digest) = extract_digest(&String::from_utf8_lossy(&body)) {
                    return Some(digest);
                }
                info!(url = %candidate, "digest file has no sha256 token");
            }
            Err(e) => {
                info!(url = %candidate, error = %e, "no digest published");
            }
        }
    }
    None
}

/// Verify the applied file at `path` against the digest published for `url`.
pub fn verify_published(fetcher: &dyn Fetcher, url: &str, path: &Path) -> IntegrityResult {
    let Some(expected) = fetch_published_digest(fetcher, url) else {
        info!(path = %path.display(), "integrity: no published digest, skipping");
        return IntegrityResult::NoDigest;
    };

    match sha256_file(path) {
        Ok(actual) if actual == expected => {
            info!(path = %path.display(), "integrity: digest ok");
            IntegrityResult::Ok
        }
        Ok(actual) => {
            warn!(
                path = %path.display(),
                expected = %expected,
                actual = %actual,
                "integrity: digest mismatch"
            );
            IntegrityResult::Mismatch { expected, actual }
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "integrity: cannot read applied file");
            IntegrityResult::Mismatch {
                expected,
                actual: String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::update::fetch::testing::MapFetcher;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const URL: &str = "https://origin.test/main.py";

    fn write_temp(content: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().expect("create temp file");
        f.write_all(content).expect("write content");
        f
    }

    #[test]
    fn file_and_slice_digests_agree() {
        let content = b"omx launcher test";
        let f = write_temp(content);
        assert_eq!(sha256_file(f.path()).unwrap(), sha256_hex(content));
    }

    #[test]
    fn known_digest_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn missing_file_has_no_digest() {
        assert!(sha256_file_opt(Path::new("/nonexistent/omx/main.py")).is_none());
    }

    #[test]
    fn extract_digest_from_sha256sum_output() {
        let digest = sha256_hex(b"x");
        let text = format!("{digest}  main.py\n");
        assert_eq!(extract_digest(&text), Some(digest));
    }

    #[test]
    fn extract_digest_is_lowercased() {
        let digest = sha256_hex(b"x");
        let text = format!("SHA256 (main.py) = {}", digest.to_uppercase());
        assert_eq!(extract_digest(&text), Some(digest));
    }

    #[test]
    fn extract_digest_ignores_longer_hex_runs() {
        let long = "a".repeat(128);
        assert_eq!(extract_digest(&long), None);
        assert_eq!(extract_digest("not a digest"), None);
    }

    #[test]
    fn digest_urls_use_conventional_suffixes() {
        assert_eq!(
            digest_urls(URL),
            vec![
                "https://origin.test/main.py.sha256".to_owned(),
                "https://origin.test/main.py.sha256sum".to_owned(),
            ]
        );
    }

    #[test]
    fn no_published_digest_passes() {
        let f = write_temp(b"print('hi')");
        let fetcher = MapFetcher::online();
        let result = verify_published(&fetcher, URL, f.path());
        assert_eq!(result, IntegrityResult::NoDigest);
        assert!(result.passed());
    }

    #[test]
    fn matching_digest_passes() {
        let content = b"print('hi')";
        let f = write_temp(content);
        let fetcher = MapFetcher::online()
            .with(&format!("{URL}.sha256"), format!("{}  main.py\n", sha256_hex(content)));
        assert_eq!(verify_published(&fetcher, URL, f.path()), IntegrityResult::Ok);
    }

    #[test]
    fn second_suffix_is_tried() {
        let content = b"print('hi')";
        let f = write_temp(content);
        let fetcher =
            MapFetcher::online().with(&format!("{URL}.sha256sum"), sha256_hex(content));
        assert_eq!(verify_published(&fetcher, URL, f.path()), IntegrityResult::Ok);
    }

    #[test]
    fn mismatched_digest_fails() {
        let f = write_temp(b"print('tampered')");
        let fetcher = MapFetcher::online().with(&format!("{URL}.sha256"), sha256_hex(b"other"));
        let result = verify_published(&fetcher, URL, f.path());
        assert!(matches!(result, IntegrityResult::Mismatch { .. }));
        assert!(!result.passed());
    }

    #[test]
    fn integrity_result_display() {
        assert_eq!(IntegrityResult::Ok.to_string(), "ok");
        assert_eq!(IntegrityResult::NoDigest.to_string(), "no_digest");
        let mismatch = IntegrityResult::Mismatch {
            expected: String::new(),
            actual: String::new(),
        };
        assert_eq!(mismatch.to_string(), "mismatch");
    }

    #[test]
    fn mismatch_becomes_verification_error() {
        let mismatch = IntegrityResult::Mismatch {
            expected: sha256_hex(b"published"),
            actual: sha256_hex(b"applied"),
        };
        let err = mismatch.ensure_passed("app.py").unwrap_err();
        assert!(matches!(err, LauncherError::Verification(_)));
        assert!(err.to_string().contains("app.py: digest mismatch"), "{err}");
        assert!(err.to_string().contains(&sha256_hex(b"applied")), "{err}");
    }

    #[test]
    fn passing_results_are_not_errors() {
        assert!(IntegrityResult::Ok.ensure_passed("app.py").is_ok());
        assert!(IntegrityResult::NoDigest.ensure_passed("app.py").is_ok());
    }
}
