//! Core data models for the workforce sync engine.
//!
//! This module contains the domain models shared by the import, sync,
//! data quality and alerting pipelines.

mod alert;
mod centre;
mod employee;
mod facts;
mod import;
mod period;
mod quality;
mod sync_job;

pub use alert::{
    AlertKind, AlertNotification, AlertRule, Channel, ComparisonOperator, EvaluationPeriod,
};
pub use centre::Centre;
pub use employee::EmployeeRecord;
pub use facts::{AbsenceEntry, PayrollPeriod, Provenance, ScheduleEntry};
pub use import::{
    ColumnBinding, FileKind, ImportMapping, ImportRequest, MappedRow, MappingProfile, RawRow,
    WriteStrategy,
};
pub use period::PeriodWindow;
pub use quality::{DataQualityIssue, IssueKey, IssueKind, Severity};
pub use sync_job::{
    SyncEntity, SyncErrorEntry, SyncErrorKind, SyncJobLog, SyncStatus, TriggerSource,
};
