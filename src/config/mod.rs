//! Configuration loading and management for the workforce sync engine.
//!
//! This module loads import rules, external sync settings and data quality
//! thresholds from YAML files. Configuration is always handed to the
//! components that need it; nothing reads global state.
//!
//! # Example
//!
//! ```no_run
//! use workforce_sync::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("Chunk size: {}", config.sync().chunk_size);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AppConfig, DailyScheduleConfig, ExternalApiConfig, FieldAliases, FileKindRules, ImportConfig,
    OutlierConfig, QualityConfig, RetryConfig, SeverityBands, SyncConfig,
};
