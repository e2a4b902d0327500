//! Batch reconciliation shared by file imports and sync jobs.
//!
//! File imports and the sync orchestrator both turn their input into typed
//! rows and write them through a [`BatchReconciler`]. The reconciler only
//! knows about natural keys and write strategies; tables implement
//! [`UpsertTarget`].

mod batch;
mod rows;

pub use batch::{
    BatchReconciler, DEFAULT_CHUNK_SIZE, ReconcileReport, RowError, RowOutcome, UpsertTarget,
};
pub use rows::{AbsenceRow, CentreRow, EmployeeRef, EmployeeRow, Keyed, PayrollRow, ScheduleRow};
