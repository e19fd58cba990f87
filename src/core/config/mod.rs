//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Strata has two configuration scopes:
//! - **Global**: User-level settings (author, logging)
//! - **Repo**: Repository-level settings (ignore list, search order)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$STRATA_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/strata/config.toml`
//! 3. `~/.strata/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use strata::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/workspace"))).unwrap();
//! println!("Author: {}", config.author());
//! println!("Depth first: {}", config.search_depth_first());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, LogConfig, RepoConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::REPO_DIR;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence rules automatically. Repo config overrides
/// global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if in a repo)
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `workspace` is provided, also loads its repository config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(workspace: Option<&Path>) -> Result<Config, ConfigError> {
        Self::load_with(Self::locate_global().as_deref(), workspace)
    }

    /// Load from an explicit global config file instead of searching.
    pub fn load_with(global: Option<&Path>, workspace: Option<&Path>) -> Result<Config, ConfigError> {
        let (global, global_path) = match global {
            Some(path) if path.exists() => (Self::read_config(path)?, Some(path.to_path_buf())),
            _ => (GlobalConfig::default(), None),
        };

        let (repo, repo_path) = match workspace.map(Self::repo_config_path) {
            Some(path) if path.exists() => (Some(Self::read_config::<RepoConfig>(&path)?), Some(path)),
            _ => (None, None),
        };

        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        tracing::debug!(
            global = ?global_path,
            repo = ?repo_path,
            "loaded configuration"
        );

        Ok(Config {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    /// Build a configuration from in-memory values, bypassing the files.
    pub fn from_parts(global: GlobalConfig, repo: Option<RepoConfig>) -> Config {
        Config {
            global,
            repo,
            global_path: None,
            repo_path: None,
        }
    }

    /// Find the global config file, if any.
    fn locate_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("STRATA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("strata/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".strata/config.toml"))
            .filter(|path| path.exists())
    }

    fn read_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.strata/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".strata/config.toml"))
    }

    /// Get the path for repo config.
    ///
    /// Returns `.strata/config.toml` relative to the given workspace.
    pub fn repo_config_path(workspace: &Path) -> PathBuf {
        workspace.join(REPO_DIR).join("config.toml")
    }

    /// Write repo config atomically.
    pub fn write_repo(workspace: &Path, config: &RepoConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::repo_config_path(workspace);
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write a config file atomically (temp file, then rename).
    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        let write_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| ConfigError::WriteError { path, source }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error(path))?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(write_error(temp_path.as_path()))?;
        file.write_all(contents.as_bytes())
            .map_err(write_error(temp_path.as_path()))?;
        file.sync_all().map_err(write_error(temp_path.as_path()))?;

        fs::rename(&temp_path, path).map_err(write_error(path))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Author recorded on new states.
    ///
    /// Falls back to `$USER` / `$USERNAME`, then "unknown".
    pub fn author(&self) -> String {
        self.repo
            .as_ref()
            .and_then(|r| r.author.clone())
            .or_else(|| self.global.author.clone())
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Commit even when nothing changed.
    ///
    /// Defaults to `false` if not configured.
    pub fn force_commit(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.force_commit)
            .unwrap_or(false)
    }

    /// Extra names skipped when scanning.
    pub fn ignore(&self) -> &[String] {
        self.repo
            .as_ref()
            .and_then(|r| r.ignore.as_deref())
            .unwrap_or_default()
    }

    /// Whether hash searches run depth first.
    ///
    /// Defaults to `true` if not configured.
    pub fn search_depth_first(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.search.as_deref())
            .map_or(true, |s| s == "depth-first")
    }

    /// Default log level.
    ///
    /// Defaults to "warn" if not configured.
    pub fn log_level(&self) -> &str {
        self.global
            .log
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("warn")
    }

    /// Whether logs are emitted as JSON.
    pub fn log_json(&self) -> bool {
        self.global
            .log
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .is_some_and(|f| f == "json")
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
