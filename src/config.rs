//! Configuration types for the launcher and its self-updater.

use crate::error::{LauncherError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Placeholder substituted with the target file path in command arguments.
pub const FILE_PLACEHOLDER: &str = "{file}";

const ORIGIN_BASE: &str = "https://raw.githubusercontent.com/Virensahtiofficial/omx/main";

/// Top-level launcher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Filesystem layout.
    pub paths: PathsConfig,
    /// Remote manifest and source files.
    pub sources: SourcesConfig,
    /// Connectivity probe and fetch settings.
    pub network: NetworkConfig,
    /// Isolated smoke test of the main file.
    pub smoke_test: SmokeTestConfig,
    /// How the launcher starts the main file after updating.
    pub launch: LaunchConfig,
}

/// Filesystem layout of the working tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Working directory (None = [`crate::launcher_dirs::base_dir`]).
    pub base_dir: Option<PathBuf>,
    /// Staging directory name, relative to the base directory.
    pub staging_dir: String,
    /// Update log file name, relative to the base directory.
    pub log_file: String,
    /// Suffix appended to a working file name to form its backup slot.
    pub backup_suffix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            staging_dir: "update".to_owned(),
            log_file: "update.log".to_owned(),
            backup_suffix: "bak".to_owned(),
        }
    }
}

/// Role a tracked source file plays once installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    /// Supporting module loaded by the main file.
    #[default]
    Module,
    /// Entry point; smoke tested after every apply.
    Main,
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::Main => write!(f, "main"),
        }
    }
}

/// A remote file mirrored into the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// File name inside the working and staging directories.
    pub file_name: String,
    /// URL the file is fetched from.
    pub url: String,
}

/// A tracked source file with its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// File name inside the working and staging directories.
    pub file_name: String,
    /// URL the file is fetched from.
    pub url: String,
    /// Module or main entry point.
    #[serde(default)]
    pub role: FileRole,
}

/// Remote origin of the manifest and the source files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Dependency manifest (one package specifier per line).
    pub manifest: RemoteFile,
    /// Source files kept in sync with the origin.
    pub files: Vec<SourceFile>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            manifest: RemoteFile {
                file_name: "requirements.txt".to_owned(),
                url: format!("{ORIGIN_BASE}/requirements.txt"),
            },
            files: vec![
                SourceFile {
                    file_name: "app.py".to_owned(),
                    url: format!("{ORIGIN_BASE}/app.py"),
                    role: FileRole::Module,
                },
                SourceFile {
                    file_name: "main.py".to_owned(),
                    url: format!("{ORIGIN_BASE}/main.py"),
                    role: FileRole::Main,
                },
            ],
        }
    }
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Well-known URL probed with a HEAD request before fetching.
    pub probe_url: String,
    /// Timeout for the connectivity probe, in seconds.
    pub probe_timeout_secs: u64,
    /// Connect/read timeout for each fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_url: "https://raw.githubusercontent.com/".to_owned(),
            probe_timeout_secs: 3,
            fetch_timeout_secs: 15,
            user_agent: format!("omx-launcher/{} (self-update)", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Smoke test command.
///
/// The candidate file is evaluated by `program args...` in a child process,
/// with [`FILE_PLACEHOLDER`] replaced by the candidate's path. A non-zero exit
/// status, a spawn failure, or a timeout fails the smoke test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeTestConfig {
    /// Whether the main file is smoke tested after apply.
    pub enabled: bool,
    /// Interpreter executable.
    pub program: String,
    /// Interpreter arguments.
    pub args: Vec<String>,
    /// Maximum run time before the child is killed, in seconds.
    pub timeout_secs: u64,
}

impl Default for SmokeTestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "python3".to_owned(),
            // A non-`__main__` run name evaluates the module body without
            // entering its entry-point block.
            args: vec![
                "-c".to_owned(),
                "import runpy, sys; runpy.run_path(sys.argv[1], run_name='__omx_smoke_test__')"
                    .to_owned(),
                FILE_PLACEHOLDER.to_owned(),
            ],
            timeout_secs: 30,
        }
    }
}

/// Launch command for the main file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Interpreter executable.
    pub program: String,
    /// Interpreter arguments.
    pub args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_owned(),
            args: vec![FILE_PLACEHOLDER.to_owned()],
        }
    }
}

/// Immutable run flags threaded into the updater.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Apply staged files even when unchanged or when the download failed.
    pub force: bool,
    /// Skip the update cycle entirely.
    pub skip_update: bool,
    /// Suppress interactive output (spinner, banners).
    pub silent: bool,
    /// Echo update log lines to the console.
    pub verbose: bool,
}

impl LauncherConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| LauncherError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return the defaults. Either
    /// way the result has passed [`LauncherConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::from_file(path);
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LauncherError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::launcher_dirs::config_file()
    }

    /// Check invariants the updater relies on.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError::Config`] when a file name is not a bare name
    /// (backups and temp files must live in the same directory as the working
    /// file), when names collide, or when no main file is configured.
    pub fn validate(&self) -> Result<()> {
        let mut names: Vec<&str> = vec![self.sources.manifest.file_name.as_str()];
        names.extend(self.sources.files.iter().map(|f| f.file_name.as_str()));

        for name in &names {
            if !is_bare_file_name(name) {
                return Err(LauncherError::Config(format!(
                    "file name must not contain a path: {name:?}"
                )));
            }
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(LauncherError::Config(format!(
                    "duplicate file name: {name:?}"
                )));
            }
        }
        if self.main_file().is_none() {
            return Err(LauncherError::Config(
                "no source file has role \"main\"".to_owned(),
            ));
        }
        if self.paths.backup_suffix.is_empty() {
            return Err(LauncherError::Config("backup_suffix must not be empty".to_owned()));
        }
        Ok(())
    }

    /// Working directory.
    pub fn base_dir(&self) -> PathBuf {
        self.paths
            .base_dir
            .clone()
            .unwrap_or_else(crate::launcher_dirs::base_dir)
    }

    /// Staging directory (`<base>/<staging_dir>`).
    pub fn staging_dir(&self) -> PathBuf {
        self.base_dir().join(&self.paths.staging_dir)
    }

    /// Update log path (`<base>/<log_file>`).
    pub fn log_path(&self) -> PathBuf {
        self.base_dir().join(&self.paths.log_file)
    }

    /// Working path of the dependency manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.base_dir().join(&self.sources.manifest.file_name)
    }

    /// The first source file with [`FileRole::Main`].
    pub fn main_file(&self) -> Option<&SourceFile> {
        self.sources.files.iter().find(|f| f.role == FileRole::Main)
    }
}

/// Replace every [`FILE_PLACEHOLDER`] in `args` with `file`.
pub fn expand_file_placeholder(args: &[String], file: &Path) -> Vec<OsString> {
    args.iter()
        .map(|arg| {
            if arg == FILE_PLACEHOLDER {
                file.as_os_str().to_owned()
            } else {
                OsString::from(arg.replace(FILE_PLACEHOLDER, &file.to_string_lossy()))
            }
        })
        .collect()
}

fn is_bare_file_name(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && path.file_name().is_some_and(|f| f == path.as_os_str())
        && name != "."
        && name != ".."
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LauncherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sources.files.len(), 2);
        assert!(config.network.probe_timeout_secs > 0);
        assert!(config.smoke_test.enabled);
    }

    #[test]
    fn default_main_file_is_main_py() {
        let config = LauncherConfig::default();
        let main = config.main_file().unwrap();
        assert_eq!(main.file_name, "main.py");
        assert!(main.url.ends_with("/main.py"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");

        let mut config = LauncherConfig::default();
        config.paths.base_dir = Some(PathBuf::from("/srv/omx"));
        config.network.fetch_timeout_secs = 42;
        config.smoke_test.program = "python3.12".to_owned();

        config.save_to_file(&path).unwrap();
        let loaded = LauncherConfig::from_file(&path).unwrap();

        assert_eq!(loaded.paths.base_dir, Some(PathBuf::from("/srv/omx")));
        assert_eq!(loaded.network.fetch_timeout_secs, 42);
        assert_eq!(loaded.smoke_test.program, "python3.12");
        assert_eq!(loaded.sources.files, config.sources.files);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml_str = r#"
[network]
probe_timeout_secs = 1
"#;
        let config: LauncherConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.network.probe_timeout_secs, 1);
        assert_eq!(config.network.fetch_timeout_secs, 15);
        assert_eq!(config.paths.staging_dir, "update");
        assert_eq!(config.sources.manifest.file_name, "requirements.txt");
    }

    #[test]
    fn role_defaults_to_module() {
        let toml_str = r#"
[sources]
manifest = { file_name = "requirements.txt", url = "http://origin/requirements.txt" }

[[sources.files]]
file_name = "lib.py"
url = "http://origin/lib.py"

[[sources.files]]
file_name = "run.py"
url = "http://origin/run.py"
role = "main"
"#;
        let config: LauncherConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sources.files[0].role, FileRole::Module);
        assert_eq!(config.sources.files[1].role, FileRole::Main);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = LauncherConfig::from_file(Path::new("/nonexistent/path/launcher.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        std::fs::write(&path, "this is [not valid").unwrap();
        let result = LauncherConfig::from_file(&path);
        assert!(matches!(result, Err(LauncherError::Config(_))));
    }

    #[test]
    fn load_or_default_without_file() {
        let config =
            LauncherConfig::load_or_default(Path::new("/nonexistent/omx/launcher.toml")).unwrap();
        assert_eq!(config.paths.log_file, "update.log");
    }

    #[test]
    fn load_or_default_validates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        std::fs::write(&path, "[paths]\nbackup_suffix = \"\"\n").unwrap();
        assert!(matches!(
            LauncherConfig::load_or_default(&path),
            Err(LauncherError::Config(_))
        ));
    }

    #[test]
    fn validate_rejects_path_in_file_name() {
        let mut config = LauncherConfig::default();
        config.sources.files[0].file_name = "../escape.py".to_owned();
        assert!(matches!(config.validate(), Err(LauncherError::Config(_))));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut config = LauncherConfig::default();
        config.sources.files[0].file_name = "main.py".to_owned();
        assert!(matches!(config.validate(), Err(LauncherError::Config(_))));
    }

    #[test]
    fn validate_requires_main_file() {
        let mut config = LauncherConfig::default();
        for file in &mut config.sources.files {
            file.role = FileRole::Module;
        }
        assert!(matches!(config.validate(), Err(LauncherError::Config(_))));
    }

    #[test]
    fn derived_paths_live_under_base_dir() {
        let mut config = LauncherConfig::default();
        config.paths.base_dir = Some(PathBuf::from("/work"));
        assert_eq!(config.staging_dir(), PathBuf::from("/work/update"));
        assert_eq!(config.log_path(), PathBuf::from("/work/update.log"));
        assert_eq!(config.manifest_path(), PathBuf::from("/work/requirements.txt"));
    }

    #[test]
    fn placeholder_is_expanded() {
        let args = vec![
            "-c".to_owned(),
            "print(1)".to_owned(),
            FILE_PLACEHOLDER.to_owned(),
            "--path={file}".to_owned(),
        ];
        let expanded = expand_file_placeholder(&args, Path::new("/work/main.py"));
        assert_eq!(
            expanded,
            vec![
                OsString::from("-c"),
                OsString::from("print(1)"),
                OsString::from("/work/main.py"),
                OsString::from("--path=/work/main.py"),
            ]
        );
    }

    #[test]
    fn file_role_display() {
        assert_eq!(FileRole::Main.to_string(), "main");
        assert_eq!(FileRole::Module.to_string(), "module");
    }
}
