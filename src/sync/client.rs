//! External scheduling API boundary.
//!
//! The orchestrator talks to the scheduling platform only through the
//! read-only [`SchedulingApi`] trait. [`FixtureSchedulingApi`] serves
//! records from memory and can inject failures and latency per entity.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PeriodWindow, SyncEntity};

/// Scope of one list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchQuery {
    /// Business the roster belongs to.
    pub business_id: String,
    /// Service within the business.
    pub service_id: String,
    /// Inclusive date range; ignored by the employee listing.
    pub range: Option<PeriodWindow>,
    /// Scheduling site to narrow to.
    pub site_id: Option<String>,
}

/// An employee as listed by the scheduling platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEmployee {
    /// Scheduling ID.
    pub id: String,
    /// Full name.
    pub name: String,
    /// Payroll code, if the platform stores one.
    #[serde(default)]
    pub payroll_code: Option<String>,
    /// Home site.
    #[serde(default)]
    pub site_id: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Contract start.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Contract end.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// A planned shift as listed by the scheduling platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSchedule {
    /// Shift ID.
    pub id: String,
    /// Scheduling ID of the employee.
    pub employee_id: String,
    /// Site of the shift.
    #[serde(default)]
    pub site_id: Option<String>,
    /// Day of the shift.
    pub date: NaiveDate,
    /// Planned hours.
    pub hours: Decimal,
}

/// An absence as listed by the scheduling platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAbsence {
    /// Absence ID.
    pub id: String,
    /// Scheduling ID of the employee.
    pub employee_id: String,
    /// Absence type.
    pub kind: String,
    /// First day.
    pub start_date: NaiveDate,
    /// Last day.
    pub end_date: NaiveDate,
}

/// Failures of an external call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalApiError {
    /// The call did not answer within the configured timeout.
    #[error("Request timed out after {elapsed_ms} ms")]
    Timeout {
        /// Time waited before giving up.
        elapsed_ms: u64,
    },

    /// The platform could not be reached.
    #[error("Scheduling API unreachable: {message}")]
    Unreachable {
        /// Transport failure description.
        message: String,
    },

    /// The credentials were rejected.
    #[error("Scheduling API rejected the credentials")]
    Unauthorized,

    /// The platform asked the caller to slow down.
    #[error("Scheduling API rate limit exceeded")]
    RateLimited {
        /// Suggested wait before retrying.
        retry_after_ms: Option<u64>,
    },

    /// The response could not be understood.
    #[error("Malformed response: {message}")]
    Malformed {
        /// What was wrong with the payload.
        message: String,
    },
}

impl ExternalApiError {
    /// Returns true if retrying the call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExternalApiError::Timeout { .. }
                | ExternalApiError::Unreachable { .. }
                | ExternalApiError::RateLimited { .. }
        )
    }
}

/// Read-only access to the external scheduling platform.
#[async_trait]
pub trait SchedulingApi: Send + Sync {
    /// Lists the employees of the scope.
    async fn list_employees(&self, query: &FetchQuery) -> Result<Vec<ExternalEmployee>, ExternalApiError>;

    /// Lists the shifts of the scope within its date range.
    async fn list_schedules(&self, query: &FetchQuery) -> Result<Vec<ExternalSchedule>, ExternalApiError>;

    /// Lists the absences of the scope overlapping its date range.
    async fn list_absences(&self, query: &FetchQuery) -> Result<Vec<ExternalAbsence>, ExternalApiError>;
}

#[derive(Debug, Default)]
struct Faults {
    errors: HashMap<SyncEntity, ExternalApiError>,
    delays: HashMap<SyncEntity, Duration>,
    calls: HashMap<SyncEntity, u32>,
}

/// In-memory scheduling platform.
///
/// Filters by site and date range like the real platform. Failures and
/// latency can be injected per entity; every list call is counted.
#[derive(Debug, Default)]
pub struct FixtureSchedulingApi {
    employees: Vec<ExternalEmployee>,
    schedules: Vec<ExternalSchedule>,
    absences: Vec<ExternalAbsence>,
    faults: Mutex<Faults>,
}

impl FixtureSchedulingApi {
    /// Creates a platform serving the given records.
    pub fn new(
        employees: Vec<ExternalEmployee>,
        schedules: Vec<ExternalSchedule>,
        absences: Vec<ExternalAbsence>,
    ) -> Self {
        Self {
            employees,
            schedules,
            absences,
            faults: Mutex::default(),
        }
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every call for `entity` fail with `error`.
    pub fn fail(&self, entity: SyncEntity, error: ExternalApiError) {
        self.faults().errors.insert(entity, error);
    }

    /// Makes every call for `entity` take at least `delay`.
    pub fn delay(&self, entity: SyncEntity, delay: Duration) {
        self.faults().delays.insert(entity, delay);
    }

    /// Removes injected failures and latency.
    pub fn heal(&self) {
        let mut faults = self.faults();
        faults.errors.clear();
        faults.delays.clear();
    }

    /// Number of list calls made for `entity`.
    pub fn calls(&self, entity: SyncEntity) -> u32 {
        self.faults().calls.get(&entity).copied().unwrap_or(0)
    }

    async fn enter(&self, entity: SyncEntity) -> Result<(), ExternalApiError> {
        let (delay, error) = {
            let mut faults = self.faults();
            *faults.calls.entry(entity).or_default() += 1;
            (
                faults.delays.get(&entity).copied(),
                faults.errors.get(&entity).cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn same_site(wanted: Option<&str>, actual: Option<&str>) -> bool {
    wanted.is_none_or(|wanted| actual == Some(wanted))
}

#[async_trait]
impl SchedulingApi for FixtureSchedulingApi {
    async fn list_employees(&self, query: &FetchQuery) -> Result<Vec<ExternalEmployee>, ExternalApiError> {
        self.enter(SyncEntity::Employees).await?;
        Ok(self
            .employees
            .iter()
            .filter(|e| same_site(query.site_id.as_deref(), e.site_id.as_deref()))
            .cloned()
            .collect())
    }

    async fn list_schedules(&self, query: &FetchQuery) -> Result<Vec<ExternalSchedule>, ExternalApiError> {
        self.enter(SyncEntity::Schedules).await?;
        Ok(self
            .schedules
            .iter()
            .filter(|s| same_site(query.site_id.as_deref(), s.site_id.as_deref()))
            .filter(|s| query.range.is_none_or(|range| range.contains(s.date)))
            .cloned()
            .collect())
    }

    async fn list_absences(&self, query: &FetchQuery) -> Result<Vec<ExternalAbsence>, ExternalApiError> {
        self.enter(SyncEntity::Absences).await?;
        let site_employees: Option<Vec<&str>> = query.site_id.as_deref().map(|site| {
            self.employees
                .iter()
                .filter(|e| e.site_id.as_deref() == Some(site))
                .map(|e| e.id.as_str())
                .collect()
        });
        Ok(self
            .absences
            .iter()
            .filter(|a| {
                site_employees
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&a.employee_id.as_str()))
            })
            .filter(|a| {
                query
                    .range
                    .is_none_or(|range| a.start_date <= range.end && range.start <= a.end_date)
            })
            .cloned()
            .collect())
    }
}
