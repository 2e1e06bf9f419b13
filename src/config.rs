//! Settings read from a TOML file. Every field has a default, so an empty
//! file (or no file) is a valid configuration.

use crate::exporter::ExportOptions;
use crate::sql::ParseOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub log_level: String,
    pub parse: ParseOptions,
    pub export: ExportOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            parse: ParseOptions::default(),
            export: ExportOptions::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.max_level()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn max_level(&self) -> Result<tracing::Level, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_tables_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
log_level = "debug"

[parse]
fold_unquoted_identifiers = true

[export]
include_grants = false
grant_roles = ["authenticated"]

[export.generator]
if_not_exists = false
"#,
        )
        .unwrap();

        assert_eq!(config.max_level().unwrap(), tracing::Level::DEBUG);
        assert!(config.parse.fold_unquoted_identifiers);
        assert!(!config.export.include_grants);
        assert!(config.export.include_rls);
        assert_eq!(config.export.grant_roles, vec!["authenticated"]);
        assert!(!config.export.generator.if_not_exists);
        assert!(config.export.generator.include_comments);
    }

    #[test]
    fn test_bad_level_rejected() {
        let err = Config::from_toml_str("log_level = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::LogLevel(level) if level == "loud"));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.export.include_extensions = false;
        file.write_all(toml::to_string_pretty(&config).unwrap().as_bytes())
            .unwrap();

        assert_eq!(Config::load(file.path()).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/nonexistent/schemaforge.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
