//! HTTP API module for the workforce sync engine.
//!
//! This module exposes imports, mapping profiles, sync jobs, data quality
//! issues, alert rules and notifications as a JSON API, plus CSV exports of
//! the audit read models.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{
    CancelRequest, EvaluateRequest, ImportCommitRequest, ImportFileRequest, NotificationQuery,
    ProfileRef, RecalculateRequest, RuleActivation, SyncJobQuery, SyncStartQuery,
};
pub use response::{ApiError, ApiErrorResponse};
pub use state::AppState;
