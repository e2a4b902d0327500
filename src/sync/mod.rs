//! Pull-based synchronization with the external scheduling platform.
//!
//! Jobs are triggered manually or by the daily schedule, pull employees,
//! schedules and absences through [`SchedulingApi`] (over HTTP with [`HttpSchedulingApi`]) and converge the record
//! store with upserts. Every job leaves a [`SyncJobLog`](crate::models::SyncJobLog).

mod client;
mod http;
mod jobs;
mod orchestrator;
mod retry;
mod schedule;

pub use client::{
    ExternalAbsence, ExternalApiError, ExternalEmployee, ExternalSchedule, FetchQuery,
    FixtureSchedulingApi, SchedulingApi,
};
pub use http::HttpSchedulingApi;
pub use jobs::SyncJobRepository;
pub use orchestrator::{MAX_LOOKBACK_DAYS, SyncOrchestrator, SyncRequest};
pub use retry::call_with_retry;
pub use schedule::{DailySchedule, run_daily};
