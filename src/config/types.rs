//! Configuration types for the workforce sync engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{FileKind, Severity};

/// The accepted header aliases of one canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAliases {
    /// The canonical field key.
    pub field: String,
    /// Accepted lowercase aliases.
    pub aliases: Vec<String>,
}

/// Mapping and validation rules for one file kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileKindRules {
    /// Alias dictionary in declaration (priority) order.
    pub aliases: Vec<FieldAliases>,
    /// Fields that must be mapped and non-null.
    pub required: Vec<String>,
    /// Fields whose values must be unique within one import.
    #[serde(default)]
    pub unique: Vec<String>,
    /// Fields holding email addresses.
    #[serde(default)]
    pub email_fields: Vec<String>,
    /// Fields holding dates.
    #[serde(default)]
    pub date_fields: Vec<String>,
    /// Fields holding decimal numbers.
    #[serde(default)]
    pub numeric_fields: Vec<String>,
}

/// Import configuration from import.yaml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Rules for restaurant (centre) files.
    pub restaurant: FileKindRules,
    /// Rules for payroll files.
    pub payroll: FileKindRules,
}

impl ImportConfig {
    /// Returns the rules for a file kind.
    pub fn rules_for(&self, kind: FileKind) -> &FileKindRules {
        match kind {
            FileKind::Restaurant => &self.restaurant,
            FileKind::Payroll => &self.payroll,
        }
    }
}

/// Connection scope of the external scheduling API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalApiConfig {
    /// Base URL of the API.
    pub base_url: String,
    /// Business the roster belongs to.
    pub business_id: String,
    /// Service within the business.
    pub service_id: String,
    /// API credential sent as a bearer token, if the deployment provides one.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

/// Bounded exponential backoff for external calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Growth factor between retries.
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Returns the delay before retry number `attempt` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use workforce_sync::config::RetryConfig;
    /// use std::time::Duration;
    ///
    /// let retry = RetryConfig::default();
    /// assert_eq!(retry.calculate_backoff(1), Duration::from_millis(500));
    /// assert_eq!(retry.calculate_backoff(2), Duration::from_millis(1000));
    /// assert_eq!(retry.calculate_backoff(10), Duration::from_millis(10_000));
    /// ```
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// The unattended daily sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyScheduleConfig {
    /// Hour of day (UTC) the job starts.
    pub hour: u32,
    /// Minute of the hour the job starts.
    pub minute: u32,
    /// Fixed lookback window in days.
    pub lookback_days: u32,
}

impl Default for DailyScheduleConfig {
    fn default() -> Self {
        Self {
            hour: 3,
            minute: 0,
            lookback_days: 7,
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_chunk_size() -> usize {
    50
}

fn default_lookback_days() -> u32 {
    30
}

/// Sync configuration from sync.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// External scheduling API scope.
    pub api: ExternalApiConfig,
    /// Timeout of a single external call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Rows per reconciler chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Lookback used by manual jobs that do not specify one.
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: u32,
    /// The unattended daily job.
    #[serde(default)]
    pub schedule: DailyScheduleConfig,
}

impl SyncConfig {
    /// Returns the per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Lower bounds of the three most urgent severities; anything below `media`
/// is `baja`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBands {
    /// Minimum value rated `critica`.
    pub critica: Decimal,
    /// Minimum value rated `alta`.
    pub alta: Decimal,
    /// Minimum value rated `media`.
    pub media: Decimal,
}

impl SeverityBands {
    /// Rates a magnitude against the bands.
    ///
    /// # Examples
    ///
    /// ```
    /// use workforce_sync::config::SeverityBands;
    /// use workforce_sync::models::Severity;
    /// use rust_decimal::Decimal;
    ///
    /// let bands = SeverityBands {
    ///     critica: Decimal::new(40, 0),
    ///     alta: Decimal::new(20, 0),
    ///     media: Decimal::new(8, 0),
    /// };
    /// assert_eq!(bands.classify(Decimal::new(8, 0)), Severity::Media);
    /// assert_eq!(bands.classify(Decimal::new(45, 0)), Severity::Critica);
    /// assert_eq!(bands.classify(Decimal::new(2, 0)), Severity::Baja);
    /// ```
    pub fn classify(&self, magnitude: Decimal) -> Severity {
        if magnitude >= self.critica {
            Severity::Critica
        } else if magnitude >= self.alta {
            Severity::Alta
        } else if magnitude >= self.media {
            Severity::Media
        } else {
            Severity::Baja
        }
    }
}

/// Cost outlier band parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// Tukey fence multiplier applied to the interquartile range.
    pub fence_multiplier: Decimal,
    /// Minimum number of cost samples in a centre before outliers are flagged.
    pub min_sample: usize,
    /// Severity bands over the distance beyond the fence, in IQR units.
    pub severity: SeverityBands,
}

/// Data quality configuration from quality.yaml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Severity bands over the hour gap of plan/payroll mismatches.
    pub hours_gap: SeverityBands,
    /// Cost outlier detection.
    pub outlier: OutlierConfig,
    /// Severity of active employees without a centre.
    pub unassigned_severity: Severity,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            hours_gap: SeverityBands {
                critica: Decimal::new(40, 0),
                alta: Decimal::new(20, 0),
                media: Decimal::new(8, 0),
            },
            outlier: OutlierConfig {
                fence_multiplier: Decimal::new(15, 1),
                min_sample: 4,
                severity: SeverityBands {
                    critica: Decimal::new(3, 0),
                    alta: Decimal::new(15, 1),
                    media: Decimal::new(5, 1),
                },
            },
            unassigned_severity: Severity::Alta,
        }
    }
}

/// The complete engine configuration loaded from YAML files.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Import mapping and validation rules.
    import: ImportConfig,
    /// External sync settings.
    sync: SyncConfig,
    /// Data quality thresholds.
    quality: QualityConfig,
}

impl AppConfig {
    /// Creates a new AppConfig from its component parts.
    pub fn new(import: ImportConfig, sync: SyncConfig, quality: QualityConfig) -> Self {
        Self {
            import,
            sync,
            quality,
        }
    }

    /// Returns the import configuration.
    pub fn import(&self) -> &ImportConfig {
        &self.import
    }

    /// Returns the sync configuration.
    pub fn sync(&self) -> &SyncConfig {
        &self.sync
    }

    /// Returns the data quality configuration.
    pub fn quality(&self) -> &QualityConfig {
        &self.quality
    }
}
