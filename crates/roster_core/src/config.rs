//! Runtime configuration.
//!
//! Resolution order: built-in defaults, then the optional TOML file, then
//! `ROSTER_*` environment variables. Command-line flags are applied by the
//! binary on top of the result.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "ROSTER_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "ROSTER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ROSTER_LOG_DIR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `None` keeps everything in memory for the process.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling log files; `None` disables file logging.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Render(toml::ser::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config file `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Render(err) => write!(f, "failed to render config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Render(err) => Some(err),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl RosterConfig {
    /// Reads the file (when given) and applies process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Render)
    }

    /// Applies `ROSTER_*` overrides read through `lookup`; blank values are
    /// ignored.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(path) = non_blank(ENV_DB_PATH) {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(level) = non_blank(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(dir) = non_blank(ENV_LOG_DIR) {
            self.logging.dir = Some(PathBuf::from(dir));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{RosterConfig, ENV_DB_PATH, ENV_LOG_LEVEL};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = RosterConfig::from_toml_str(
            r#"
            [logging]
            level = "warn"
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.dir, None);
        assert_eq!(config.database.path, None);
    }

    #[test]
    fn environment_overrides_file_values() {
        let config = RosterConfig::from_toml_str(
            r#"
            [database]
            path = "from-file.db"
            "#,
        )
        .unwrap();
        let env = HashMap::from([
            (ENV_DB_PATH, "from-env.db".to_string()),
            (ENV_LOG_LEVEL, "  ".to_string()),
        ]);

        let config = config.with_env(|key| env.get(key).cloned());
        assert_eq!(config.database.path, Some(PathBuf::from("from-env.db")));
        assert_eq!(config.logging.level, super::default_log_level());
    }

    #[test]
    fn rendered_config_names_both_sections() {
        let mut config = RosterConfig::default();
        config.database.path = Some(PathBuf::from("roster.db"));
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("[database]"));
        assert!(rendered.contains("[logging]"));
    }

    #[test]
    fn unknown_value_types_are_rejected() {
        assert!(RosterConfig::from_toml_str("[logging]\nlevel = 3\n").is_err());
    }
}
