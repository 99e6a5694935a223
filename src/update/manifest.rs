//! Dependency manifest parsing.
//!
//! The manifest is a pip-style requirements list: one package specifier per
//! line. Blank lines, `#` comments and requirement-file directives
//! (`-r other.txt`, `--requirement other.txt`) are skipped.

use crate::error::Result;
use std::path::Path;

/// Directives that pull in another requirements file.
const REQUIREMENT_FILE_DIRECTIVES: &[&str] = &["-r", "--requirement"];

/// Parse manifest text into the list of package specifiers.
pub fn parse_requirements(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#'))
        .filter(|line| !is_requirement_file_directive(line))
        .map(str::to_owned)
        .collect()
}

/// Read and parse the manifest at `path`.
///
/// A missing manifest yields an empty list.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_requirements(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_requirements(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Canonical form used for change detection.
///
/// Line endings, trailing ASCII whitespace and trailing blank lines do not
/// count as a change. Works on raw bytes, so any other byte difference does,
/// whether or not the manifest is valid UTF-8.
pub fn normalize(bytes: &[u8]) -> Vec<u8> {
    let mut lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').map(<[u8]>::trim_ascii_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join(&b'\n')
}

fn is_requirement_file_directive(line: &str) -> bool {
    REQUIREMENT_FILE_DIRECTIVES
        .iter()
        .any(|directive| line.starts_with(directive))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn skips_comments_blanks_and_directives() {
        let text = "# comment\n\nrequests>=2\n-r other.txt\nhttpx\n";
        assert_eq!(parse_requirements(text), vec!["requests>=2", "httpx"]);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let text = "  requests>=2  \r\n\thttpx\r\n";
        assert_eq!(parse_requirements(text), vec!["requests>=2", "httpx"]);
    }

    #[test]
    fn long_directive_forms_are_skipped() {
        let text = "--requirement base.txt\n--requirement=dev.txt\n-rextra.txt\nrich";
        assert_eq!(parse_requirements(text), vec!["rich"]);
    }

    #[test]
    fn indented_comment_is_skipped() {
        assert!(parse_requirements("   # pinned below\n").is_empty());
    }

    #[test]
    fn empty_manifest() {
        assert!(parse_requirements("").is_empty());
    }

    #[test]
    fn read_missing_manifest_is_empty() {
        let reqs = read_requirements(Path::new("/nonexistent/omx/requirements.txt")).unwrap();
        assert!(reqs.is_empty());
    }

    #[test]
    fn read_manifest_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "httpx\n# dev\npytest\n").unwrap();
        assert_eq!(read_requirements(&path).unwrap(), vec!["httpx", "pytest"]);
    }

    #[test]
    fn normalize_ignores_line_endings_and_trailing_space() {
        assert_eq!(normalize(b"httpx\r\nrich  \r\n\r\n"), normalize(b"httpx\nrich"));
    }

    #[test]
    fn normalize_keeps_content_changes() {
        assert_ne!(normalize(b"httpx\nrich"), normalize(b"httpx\nrich>=13"));
    }

    #[test]
    fn normalize_distinguishes_invalid_utf8_bytes() {
        assert_ne!(normalize(b"pkg\xfe\n"), normalize(b"pkg\xff\n"));
        assert_eq!(normalize(b"pkg\xfe \r\n"), b"pkg\xfe");
    }
}
