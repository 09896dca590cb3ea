//! Runtime configuration.
//!
//! Layered through the `config` crate: built-in defaults, then an optional
//! `hr_core.toml`, then `HR_CORE__*` environment variables
//! (`HR_CORE__JOURNAL__PATH=/var/lib/hr/journal.log`).

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use hr_kernel::ids::{validate_level_key, MAX_UNIT_NUMBER_WIDTH};
use hr_kernel::state::default_level_catalog;

pub const DEFAULT_CONFIG_FILE: &str = "hr_core.toml";
pub const ENV_PREFIX: &str = "HR_CORE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_unit_number_width")]
    pub unit_number_width: usize,
    #[serde(default = "default_level_catalog")]
    pub level_catalog: Vec<String>,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// No path keeps everything in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_sync")]
    pub sync: bool,
}

fn default_unit_number_width() -> usize {
    3
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_sync() -> bool {
    true
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: None,
            sync: default_sync(),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            unit_number_width: default_unit_number_width(),
            level_catalog: default_level_catalog(),
            journal: JournalConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl CoreConfig {
    /// In-memory config with the journal at `path`.
    pub fn with_journal(path: impl Into<PathBuf>) -> Self {
        Self {
            journal: JournalConfig {
                path: Some(path.into()),
                sync: true,
            },
            ..Self::default()
        }
    }

    /// Load from `file` (or `hr_core.toml` in the working directory) and the
    /// environment, then validate.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(source)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_number_width == 0 || self.unit_number_width > MAX_UNIT_NUMBER_WIDTH {
            return Err(ConfigError::Message(format!(
                "unit_number_width must be between 1 and {}, got {}",
                MAX_UNIT_NUMBER_WIDTH, self.unit_number_width
            )));
        }
        if self.level_catalog.is_empty() {
            return Err(ConfigError::Message("level_catalog must not be empty".to_string()));
        }
        for (i, level) in self.level_catalog.iter().enumerate() {
            validate_level_key(level).map_err(|e| ConfigError::Message(e.to_string()))?;
            if self.level_catalog[..i].contains(level) {
                return Err(ConfigError::Message(format!(
                    "level_catalog lists {:?} twice",
                    level
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert_eq!(config.unit_number_width, 3);
        assert_eq!(config.level_catalog.len(), 5);
        assert!(config.journal.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_width_bounds() {
        let mut config = CoreConfig::default();
        config.unit_number_width = 0;
        assert!(config.validate().is_err());
        config.unit_number_width = MAX_UNIT_NUMBER_WIDTH + 1;
        assert!(config.validate().is_err());
        config.unit_number_width = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_catalog_entry_rejected() {
        let mut config = CoreConfig::default();
        config.level_catalog.push("Wing".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hr_core.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "unit_number_width = 5\nlevel_catalog = [\"Division\", \"Team\"]\n\n[journal]\npath = \"/tmp/hr.log\"\nsync = false"
        )
        .unwrap();

        let config = CoreConfig::load(Some(&path)).unwrap();
        assert_eq!(config.unit_number_width, 5);
        assert_eq!(config.level_catalog, vec!["Division".to_string(), "Team".to_string()]);
        assert_eq!(config.journal.path, Some(PathBuf::from("/tmp/hr.log")));
        assert!(!config.journal.sync);
        assert_eq!(config.log_filter, "info");
    }
}
