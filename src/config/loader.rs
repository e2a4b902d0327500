//! Loading of the import, sync and quality settings.
//!
//! [`ConfigLoader`] reads one YAML file per concern from a profile directory.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::models::FileKind;

use super::types::{AppConfig, FileKindRules, ImportConfig, QualityConfig, SyncConfig};

/// Loads and provides access to engine configuration.
///
/// # Directory Structure
///
/// A profile directory holds three files:
/// ```text
/// config/default/
/// ├── import.yaml   # Alias dictionaries and validation rules per file kind
/// ├── sync.yaml     # External API scope, timeouts, retry, daily schedule
/// └── quality.yaml  # Data quality severity thresholds
/// ```
///
/// # Example
///
/// ```no_run
/// use workforce_sync::config::ConfigLoader;
/// use workforce_sync::models::FileKind;
///
/// let loader = ConfigLoader::load("./config/default").unwrap();
/// let rules = loader.rules_for(FileKind::Payroll);
/// println!("Required payroll fields: {:?}", rules.required);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: AppConfig,
}

impl ConfigLoader {
    /// Loads the profile stored in `path`.
    ///
    /// Fails with `ConfigNotFound` when a file is missing and with
    /// `ConfigParseError` when a file is not valid YAML or a value is out of
    /// range (a zero chunk size, for instance).
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let import = Self::load_yaml::<ImportConfig>(&path.join("import.yaml"))?;
        let sync_path = path.join("sync.yaml");
        let sync = Self::load_yaml::<SyncConfig>(&sync_path)?;
        let quality = Self::load_yaml::<QualityConfig>(&path.join("quality.yaml"))?;

        Self::check_sync(&sync, &sync_path.display().to_string())?;

        Ok(Self {
            config: AppConfig::new(import, sync, quality),
        })
    }

    /// Wraps an already-built configuration.
    pub fn from_config(config: AppConfig) -> Self {
        Self { config }
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    fn check_sync(sync: &SyncConfig, path: &str) -> EngineResult<()> {
        let problem = if sync.chunk_size == 0 {
            Some("chunk_size must be greater than zero")
        } else if sync.timeout_ms == 0 {
            Some("timeout_ms must be greater than zero")
        } else if sync.schedule.hour > 23 || sync.schedule.minute > 59 {
            Some("schedule time must be a valid hour and minute")
        } else {
            None
        };

        match problem {
            Some(message) => Err(EngineError::ConfigParseError {
                path: path.to_string(),
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Returns the underlying configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the import configuration.
    pub fn import(&self) -> &ImportConfig {
        self.config.import()
    }

    /// Returns the sync configuration.
    pub fn sync(&self) -> &SyncConfig {
        self.config.sync()
    }

    /// Returns the data quality configuration.
    pub fn quality(&self) -> &QualityConfig {
        self.config.quality()
    }

    /// Returns the mapping and validation rules for a file kind.
    pub fn rules_for(&self, kind: FileKind) -> &FileKindRules {
        self.config.import().rules_for(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use rust_decimal::Decimal;

    fn config_path() -> &'static str {
        "./config/default"
    }

    #[test]
    fn test_load_valid_configuration() {
        let result = ConfigLoader::load(config_path());
        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
    }

    #[test]
    fn test_restaurant_rules_loaded() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let rules = loader.rules_for(FileKind::Restaurant);

        assert_eq!(rules.required, vec!["code", "name"]);
        assert_eq!(rules.unique, vec!["code", "scheduling_site_id"]);
        assert_eq!(rules.aliases[0].field, "code");
        assert!(rules.aliases[0].aliases.contains(&"codigo".to_string()));
    }

    #[test]
    fn test_payroll_rules_loaded() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let rules = loader.rules_for(FileKind::Payroll);

        assert!(rules.required.contains(&"payroll_code".to_string()));
        assert_eq!(rules.numeric_fields, vec!["worked_hours", "gross_cost"]);
        assert_eq!(rules.date_fields, vec!["period_start", "period_end"]);
    }

    #[test]
    fn test_sync_settings_loaded() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let sync = loader.sync();

        assert_eq!(sync.chunk_size, 50);
        assert_eq!(sync.retry.max_retries, 3);
        assert_eq!(sync.schedule.lookback_days, 7);
        assert_eq!(sync.api.business_id, "demo-business");
        assert!(sync.api.api_key.is_none());
    }

    #[test]
    fn test_quality_thresholds_loaded() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let quality = loader.quality();

        assert_eq!(quality.hours_gap.media, Decimal::new(8, 0));
        assert_eq!(quality.outlier.fence_multiplier, Decimal::new(15, 1));
        assert_eq!(quality.unassigned_severity, Severity::Alta);
    }

    #[test]
    fn test_load_missing_directory_returns_error() {
        let result = ConfigLoader::load("/nonexistent/path");

        match result {
            Err(EngineError::ConfigNotFound { path }) => {
                assert!(path.contains("import.yaml"));
            }
            _ => panic!("Expected ConfigNotFound error"),
        }
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let mut sync: SyncConfig = serde_yaml::from_str(
            "api: {base_url: 'http://x', business_id: b, service_id: s}",
        )
        .unwrap();
        assert_eq!(sync.chunk_size, 50);
        sync.chunk_size = 0;

        let result = ConfigLoader::check_sync(&sync, "sync.yaml");
        assert!(matches!(result, Err(EngineError::ConfigParseError { .. })));
    }
}
