//! Configuration management for tidyup.
//!
//! Project config lives in `<root>/.tidyup/config.toml`, the global fallback in
//! `~/.tidyup/config.toml`. Missing files mean built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::policy::FilterPolicy;

/// tidyup configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Which dirty files are eligible for cleanup.
    #[serde(default)]
    pub policy: FilterPolicy,

    /// External formatter invoked on each eligible file.
    #[serde(default)]
    pub formatter: FormatterConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub hooks: HooksConfig,
}

/// How the formatter hands back its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatterMode {
    /// Reads the buffer on stdin and writes the formatted text to stdout.
    /// If the file on disk changed anyway, the disk wins and stdout is ignored.
    #[default]
    Stdout,
    /// Rewrites the file itself; stdout is only logging.
    InPlace,
}

/// External formatter command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Program to run. Empty disables formatting.
    #[serde(default)]
    pub command: String,

    /// Arguments; `{path}` is replaced by the absolute file path.
    #[serde(default = "default_formatter_args")]
    pub args: Vec<String>,

    #[serde(default)]
    pub mode: FormatterMode,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: default_formatter_args(),
            mode: FormatterMode::default(),
        }
    }
}

impl FormatterConfig {
    /// Arguments with `{path}` substituted.
    pub fn args_for(&self, path: &Path) -> Vec<String> {
        let path = path.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{path}", &path))
            .collect()
    }

    pub fn is_configured(&self) -> bool {
        !self.command.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            log_level: default_log_level(),
        }
    }
}

/// Git hook behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Install the pre-commit hook on `tidyup init`.
    #[serde(default = "default_true")]
    pub auto_install: bool,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self { auto_install: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_formatter_args() -> Vec<String> {
    vec!["{path}".to_string()]
}

fn default_socket_path() -> String {
    "/tmp/tidyup.sock".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Project config file path.
    pub fn project_path(project_root: &Path) -> PathBuf {
        project_root.join(".tidyup").join("config.toml")
    }

    /// Path to global tidyup directory (~/.tidyup/)
    pub fn global_dir() -> Result<PathBuf, Error> {
        let home = dirs::home_dir().ok_or(Error::HomeDirNotFound)?;
        Ok(home.join(".tidyup"))
    }

    /// Global config file path.
    pub fn global_path() -> Result<PathBuf, Error> {
        Ok(Self::global_dir()?.join("config.toml"))
    }

    /// Load the project config, falling back to the global one, then defaults.
    pub fn load(project_root: Option<&Path>) -> Result<Self, Error> {
        if let Some(root) = project_root {
            let path = Self::project_path(root);
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        match Self::global_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save config to a project directory.
    pub fn save(&self, project_root: &Path) -> Result<(), Error> {
        let path = Self::project_path(project_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;

        let with_header = format!(
            "# tidyup project configuration\n# Suffix rules are matched case-insensitively; excludes win over includes.\n\n{}",
            content
        );

        fs::write(path, with_header)?;
        Ok(())
    }
}
