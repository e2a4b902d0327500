//! Request types for the workforce sync API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::models::{FileKind, ImportMapping, PeriodWindow, RawRow, SyncEntity, SyncStatus, WriteStrategy};

/// A saved mapping profile to apply instead of resolving columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRef {
    /// Owner of the profile.
    pub owner: String,
    /// Profile name.
    pub name: String,
}

/// A parsed file submitted for import.
///
/// `headers` may be omitted, in which case they are taken from the rows.
/// At most one of `mapping` and `profile` is used; `mapping` wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFileRequest {
    /// Declared file kind.
    pub file_kind: FileKind,
    /// Header row in file order.
    #[serde(default)]
    pub headers: Vec<String>,
    /// Parsed data rows.
    pub rows: Vec<RawRow>,
    /// Explicit mapping.
    #[serde(default)]
    pub mapping: Option<ImportMapping>,
    /// Saved profile to load the mapping from.
    #[serde(default)]
    pub profile: Option<ProfileRef>,
}

/// The confirm step of an import: the same file plus the write options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportCommitRequest {
    /// The file being confirmed.
    pub file: ImportFileRequest,
    /// Write strategy.
    #[serde(default)]
    pub strategy: WriteStrategy,
    /// Import despite non-critical violations.
    #[serde(default)]
    pub force_non_critical: bool,
}

/// Query parameters of `POST /sync/jobs`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SyncStartQuery {
    /// Run the job before responding instead of in the background.
    #[serde(default)]
    pub wait: bool,
}

/// Filters of `GET /sync/jobs`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SyncJobQuery {
    /// Only jobs of this entity kind.
    pub entity: Option<SyncEntity>,
    /// Only jobs in this status.
    pub status: Option<SyncStatus>,
}

/// Body of `POST /sync/jobs/:id/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Why the job was stopped.
    #[serde(default = "default_cancel_reason")]
    pub reason: String,
}

fn default_cancel_reason() -> String {
    "cancelled by user".to_string()
}

/// Body of `POST /quality/recalculate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalculateRequest {
    /// First day of the period.
    pub start: NaiveDate,
    /// Last day of the period.
    pub end: NaiveDate,
    /// Optional centre scope.
    #[serde(default)]
    pub centre_code: Option<String>,
}

impl RecalculateRequest {
    /// Returns the validated period.
    pub fn period(&self) -> EngineResult<PeriodWindow> {
        PeriodWindow::new(self.start, self.end)
    }
}

/// Body of `POST /alerts/evaluate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluateRequest {
    /// Evaluation day; defaults to today (UTC).
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Query of `GET /alerts/notifications`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NotificationQuery {
    /// Only unread notifications.
    #[serde(default)]
    pub unread_only: bool,
}

/// Body of `PATCH /alerts/rules/:id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuleActivation {
    /// New active flag.
    pub active: bool,
}
