//! Sync job audit log.
//!
//! One [`SyncJobLog`] is written per orchestrated synchronization attempt. It
//! is created in [`SyncStatus::Running`] and finalized exactly once.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// The entity kinds a sync job can pull from the scheduling system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntity {
    /// The employee roster.
    Employees,
    /// Planned shifts.
    Schedules,
    /// Leave and absences.
    Absences,
    /// Employees, then schedules, then absences.
    Full,
}

impl SyncEntity {
    /// Returns the sub-phases this entity expands to, in execution order.
    ///
    /// # Examples
    ///
    /// ```
    /// use workforce_sync::models::SyncEntity;
    ///
    /// assert_eq!(
    ///     SyncEntity::Full.phases(),
    ///     &[SyncEntity::Employees, SyncEntity::Schedules, SyncEntity::Absences]
    /// );
    /// assert_eq!(SyncEntity::Absences.phases(), &[SyncEntity::Absences]);
    /// ```
    pub fn phases(&self) -> &'static [SyncEntity] {
        match self {
            SyncEntity::Employees => &[SyncEntity::Employees],
            SyncEntity::Schedules => &[SyncEntity::Schedules],
            SyncEntity::Absences => &[SyncEntity::Absences],
            SyncEntity::Full => &[
                SyncEntity::Employees,
                SyncEntity::Schedules,
                SyncEntity::Absences,
            ],
        }
    }

    /// Returns true if the phase queries a date range.
    pub fn uses_lookback(&self) -> bool {
        !matches!(self, SyncEntity::Employees)
    }

    /// Returns the wire name of the entity.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEntity::Employees => "employees",
            SyncEntity::Schedules => "schedules",
            SyncEntity::Absences => "absences",
            SyncEntity::Full => "full",
        }
    }
}

impl fmt::Display for SyncEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// A user pressed the sync button.
    Manual,
    /// The daily scheduler.
    Cron,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Manual => f.write_str("manual"),
            TriggerSource::Cron => f.write_str("cron"),
        }
    }
}

/// Lifecycle status of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The job is in progress.
    Running,
    /// Every attempted row succeeded.
    Completed,
    /// Some rows failed, at least one succeeded.
    Partial,
    /// The external API was unreachable, nothing succeeded, or the job was
    /// cancelled.
    Failed,
}

impl SyncStatus {
    /// Computes the final status of a job from its outcome.
    ///
    /// A job that reached the platform but had every attempted row fail is
    /// `Failed`, not `Partial`: a partial outcome needs at least one success.
    /// An empty run with no errors is `Completed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use workforce_sync::models::SyncStatus;
    ///
    /// assert_eq!(SyncStatus::resolve(false, 0, 1), SyncStatus::Failed);
    /// assert_eq!(SyncStatus::resolve(true, 10, 2), SyncStatus::Partial);
    /// assert_eq!(SyncStatus::resolve(true, 10, 0), SyncStatus::Completed);
    /// assert_eq!(SyncStatus::resolve(true, 0, 3), SyncStatus::Failed);
    /// assert_eq!(SyncStatus::resolve(true, 0, 0), SyncStatus::Completed);
    /// ```
    pub fn resolve(api_reached: bool, succeeded_rows: u64, error_rows: u64) -> SyncStatus {
        if !api_reached {
            return SyncStatus::Failed;
        }
        match (succeeded_rows, error_rows) {
            (_, 0) => SyncStatus::Completed,
            (0, _) => SyncStatus::Failed,
            _ => SyncStatus::Partial,
        }
    }

    /// Returns true for every status except `Running`.
    pub fn is_final(&self) -> bool {
        !matches!(self, SyncStatus::Running)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Partial => "partial",
            SyncStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Classification of a sync error entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// The external API call for a phase failed after retries.
    Api,
    /// A single record could not be written.
    Row,
    /// The job was cancelled before the phase ran.
    Cancelled,
}

/// One structured error recorded by a sync job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    /// What kind of failure this is.
    pub kind: SyncErrorKind,
    /// The phase the error belongs to.
    pub entity: SyncEntity,
    /// The external identifier of the failing record, or the phase name.
    pub identifier: String,
    /// Human-readable failure description.
    pub message: String,
}

/// The audit record of one sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJobLog {
    /// Job identifier.
    pub id: Uuid,
    /// The entity kind requested.
    pub entity: SyncEntity,
    /// What started the job.
    pub trigger: TriggerSource,
    /// Lookback window in days, if the job queried a date range.
    pub lookback_days: Option<u32>,
    /// Centre scope, if any.
    pub centre_code: Option<String>,
    /// When the job started.
    pub started_at: DateTime<Utc>,
    /// When the job was finalized.
    pub finished_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: SyncStatus,
    /// Rows attempted, including one unit per unreachable phase.
    pub total_rows: u64,
    /// Rows created.
    pub inserted_rows: u64,
    /// Rows updated.
    pub updated_rows: u64,
    /// Rows left untouched.
    pub skipped_rows: u64,
    /// Rows (or phases) that failed.
    pub error_rows: u64,
    /// Structured errors in the order they occurred.
    pub errors: Vec<SyncErrorEntry>,
}

impl SyncJobLog {
    /// Opens a new job log in `Running`.
    pub fn start(
        entity: SyncEntity,
        trigger: TriggerSource,
        lookback_days: Option<u32>,
        centre_code: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity,
            trigger,
            lookback_days,
            centre_code,
            started_at: Utc::now(),
            finished_at: None,
            status: SyncStatus::Running,
            total_rows: 0,
            inserted_rows: 0,
            updated_rows: 0,
            skipped_rows: 0,
            error_rows: 0,
            errors: Vec::new(),
        }
    }

    /// Adds the row counters of one completed phase.
    pub fn record_counts(&mut self, inserted: u64, updated: u64, skipped: u64, errored: u64) {
        self.inserted_rows += inserted;
        self.updated_rows += updated;
        self.skipped_rows += skipped;
        self.error_rows += errored;
        self.total_rows += inserted + updated + skipped + errored;
    }

    /// Records a phase whose external call failed; the phase counts as one
    /// attempted and failed unit.
    pub fn record_failed_phase(&mut self, entity: SyncEntity, message: impl Into<String>) {
        self.total_rows += 1;
        self.error_rows += 1;
        self.errors.push(SyncErrorEntry {
            kind: SyncErrorKind::Api,
            entity,
            identifier: entity.to_string(),
            message: message.into(),
        });
    }

    /// Appends an error entry without touching the counters.
    pub fn push_error(&mut self, entry: SyncErrorEntry) {
        self.errors.push(entry);
    }

    /// Rows that were written or deliberately skipped.
    pub fn succeeded_rows(&self) -> u64 {
        self.inserted_rows + self.updated_rows + self.skipped_rows
    }

    /// Returns true once the job has left `Running`.
    pub fn is_finalized(&self) -> bool {
        self.status.is_final()
    }

    /// Moves the job to its final status.
    ///
    /// Fails if the job was already finalized.
    pub fn finalize(&mut self, api_reached: bool) -> EngineResult<SyncStatus> {
        self.ensure_running()?;
        self.status = SyncStatus::resolve(api_reached, self.succeeded_rows(), self.error_rows);
        self.finished_at = Some(Utc::now());
        Ok(self.status)
    }

    /// Finalizes the job as `Failed` with a cancellation entry.
    pub fn cancel(&mut self, reason: impl Into<String>) -> EngineResult<()> {
        self.ensure_running()?;
        self.errors.push(SyncErrorEntry {
            kind: SyncErrorKind::Cancelled,
            entity: self.entity,
            identifier: self.id.to_string(),
            message: reason.into(),
        });
        self.status = SyncStatus::Failed;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.is_finalized() {
            return Err(EngineError::JobAlreadyFinalized { job_id: self.id });
        }
        Ok(())
    }
}
