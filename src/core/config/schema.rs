//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$STRATA_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/strata/config.toml`
//! 3. `~/.strata/config.toml` (canonical write location)
//!
//! # Repo Config
//!
//! Located at `<workspace>/.strata/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., ignore entries must be valid element names).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::ElementName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// author = "Ada Lovelace <ada@example.com>"
///
/// [log]
/// level = "info"
/// format = "text"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Author recorded on commits
    pub author: Option<String>,

    /// Logging defaults
    pub log: Option<LogConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_author(self.author.as_deref())?;
        if let Some(log) = &self.log {
            log.validate()?;
        }
        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// force_commit = false
/// ignore = ["target", "node_modules"]
/// search = "depth-first"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Commit even when the workspace matches the current state
    pub force_commit: Option<bool>,

    /// Names skipped when scanning the workspace
    pub ignore: Option<Vec<String>>,

    /// Hash search order for reverts
    pub search: Option<String>,

    /// Author override for this repository
    pub author: Option<String>,
}

impl RepoConfig {
    /// Valid hash search orders.
    pub const VALID_SEARCH: &'static [&'static str] = &["depth-first", "breadth-first"];

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(names) = &self.ignore {
            for name in names {
                ElementName::new(name.as_str()).map_err(|e| {
                    ConfigError::InvalidValue(format!("invalid ignore entry: {}", e))
                })?;
            }
        }

        if let Some(search) = &self.search {
            if !Self::VALID_SEARCH.contains(&search.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid search order '{}', must be one of: {}",
                    search,
                    Self::VALID_SEARCH.join(", ")
                )));
            }
        }

        validate_author(self.author.as_deref())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default level ("error", "warn", "info", "debug" or "trace")
    pub level: Option<String>,

    /// Output format ("text" or "json")
    pub format: Option<String>,
}

impl LogConfig {
    pub const VALID_LEVELS: &'static [&'static str] = &["error", "warn", "info", "debug", "trace"];

    pub const VALID_FORMATS: &'static [&'static str] = &["text", "json"];

    /// Validate the logging configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(level) = &self.level {
            if !Self::VALID_LEVELS.contains(&level.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid log level '{}', must be one of: {}",
                    level,
                    Self::VALID_LEVELS.join(", ")
                )));
            }
        }
        if let Some(format) = &self.format {
            if !Self::VALID_FORMATS.contains(&format.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid log format '{}', must be one of: {}",
                    format,
                    Self::VALID_FORMATS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn validate_author(author: Option<&str>) -> Result<(), ConfigError> {
    match author {
        Some(a) if a.trim().is_empty() => Err(ConfigError::InvalidValue(
            "author cannot be empty".to_string(),
        )),
        Some(a) if a.contains(['\n', '\r']) => Err(ConfigError::InvalidValue(
            "author must be a single line".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = GlobalConfig::default();
            assert!(config.author.is_none());
            assert!(config.log.is_none());
        }

        #[test]
        fn empty_author_rejected() {
            let config = GlobalConfig {
                author: Some("   ".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn invalid_log_level() {
            let config = GlobalConfig {
                log: Some(LogConfig {
                    level: Some("loud".to_string()),
                    format: None,
                }),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn roundtrip() {
            let config = GlobalConfig {
                author: Some("ada".to_string()),
                log: Some(LogConfig {
                    level: Some("debug".to_string()),
                    format: Some("json".to_string()),
                }),
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: GlobalConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }
    }

    mod repo_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = RepoConfig::default();
            assert!(config.force_commit.is_none());
            assert!(config.ignore.is_none());
        }

        #[test]
        fn valid_search_orders() {
            for search in RepoConfig::VALID_SEARCH {
                let config = RepoConfig {
                    search: Some(search.to_string()),
                    ..Default::default()
                };
                assert!(config.validate().is_ok());
            }
        }

        #[test]
        fn invalid_search_order() {
            let config = RepoConfig {
                search: Some("sideways".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn invalid_ignore_entry() {
            let config = RepoConfig {
                ignore: Some(vec!["a/b".to_string()]),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn roundtrip() {
            let config = RepoConfig {
                force_commit: Some(true),
                ignore: Some(vec!["target".to_string()]),
                search: Some("breadth-first".to_string()),
                author: Some("bot".to_string()),
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: RepoConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }

        #[test]
        fn reject_unknown_fields() {
            let toml = r#"
                force_commit = true
                unknown_field = true
            "#;

            let result: Result<RepoConfig, _> = toml::from_str(toml);
            assert!(result.is_err());
        }
    }
}
