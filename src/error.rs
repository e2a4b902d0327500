//! Error types for the workforce sync engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for the job-level and mapping-level failures that are surfaced to callers.
//! Row-level and rule-level failures are recovered locally and reported in the
//! result of the operation that produced them instead.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::store::IdentityError;

/// The main error type for the workforce sync engine.
///
/// # Example
///
/// ```
/// use workforce_sync::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/sync.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/sync.yaml");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// One or more required canonical fields have no source column.
    #[error("Required fields not mapped for {file_kind} import: {}", .fields.join(", "))]
    UnmappedRequiredFields {
        /// The kind of file being imported.
        file_kind: String,
        /// The canonical fields without a column.
        fields: Vec<String>,
    },

    /// The import contains critical violations and cannot proceed.
    #[error("Import blocked by {critical} critical and {non_critical} non-critical violations")]
    ImportBlocked {
        /// Number of critical violations.
        critical: usize,
        /// Number of non-critical violations.
        non_critical: usize,
    },

    /// The import contains non-critical violations and was not forced.
    #[error("Import has {non_critical} non-critical violations; confirm with force to proceed")]
    ForceRequired {
        /// Number of non-critical violations.
        non_critical: usize,
    },

    /// An external identifier could not be bound.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A sync request carried inconsistent parameters.
    #[error("Invalid sync request: {message}")]
    InvalidSyncRequest {
        /// A description of what made the request invalid.
        message: String,
    },

    /// No sync job exists with the given ID.
    #[error("Sync job not found: {job_id}")]
    JobNotFound {
        /// The job ID that was not found.
        job_id: Uuid,
    },

    /// The sync job has already been finalized.
    #[error("Sync job {job_id} is already finalized")]
    JobAlreadyFinalized {
        /// The finalized job.
        job_id: Uuid,
    },

    /// A period window ends before it starts.
    #[error("Invalid period: {start} is after {end}")]
    InvalidPeriod {
        /// Start of the window.
        start: NaiveDate,
        /// End of the window.
        end: NaiveDate,
    },

    /// No data quality issue exists with the given ID.
    #[error("Data quality issue not found: {issue_id}")]
    IssueNotFound {
        /// The issue ID that was not found.
        issue_id: Uuid,
    },

    /// The data quality issue was already resolved.
    #[error("Data quality issue {issue_id} is already resolved")]
    IssueAlreadyResolved {
        /// The resolved issue.
        issue_id: Uuid,
    },

    /// No mapping profile matches the lookup.
    #[error("Mapping profile '{name}' not found for {owner} ({file_kind})")]
    ProfileNotFound {
        /// Owner of the profile.
        owner: String,
        /// File kind the profile is scoped to.
        file_kind: String,
        /// Profile name.
        name: String,
    },

    /// No alert rule exists with the given ID.
    #[error("Alert rule not found: {rule_id}")]
    AlertRuleNotFound {
        /// The rule ID that was not found.
        rule_id: Uuid,
    },

    /// An alert rule definition was rejected.
    #[error("Invalid alert rule: {message}")]
    InvalidAlertRule {
        /// Why the rule was rejected.
        message: String,
    },

    /// No alert notification exists with the given ID.
    #[error("Alert notification not found: {notification_id}")]
    NotificationNotFound {
        /// The notification ID that was not found.
        notification_id: Uuid,
    },

    /// A read model could not be exported.
    #[error("Export failed: {message}")]
    ExportError {
        /// A description of the export failure.
        message: String,
    },
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
