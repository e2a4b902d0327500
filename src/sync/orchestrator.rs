//! Sync orchestrator.
//!
//! Runs one sync job: opens a [`SyncJobLog`], pulls each phase from the
//! scheduling platform and writes it through the [`BatchReconciler`] with
//! the upsert strategy, then finalizes the log.
//!
//! Phases run sequentially. A phase whose external call fails after retries
//! is recorded as one failed unit and the next phase still runs. The job is
//! `failed` when no phase reached the platform, `partial` when some rows
//! failed and some succeeded, `completed` otherwise. A job cancelled from
//! outside is left as it is and the remaining phases are skipped.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    PeriodWindow, Provenance, SyncEntity, SyncErrorEntry, SyncErrorKind, SyncJobLog,
    TriggerSource, WriteStrategy,
};
use crate::reconcile::{
    AbsenceRow, BatchReconciler, EmployeeRef, EmployeeRow, ReconcileReport, ScheduleRow,
};
use crate::store::MemoryStore;

use super::client::{ExternalApiError, FetchQuery, SchedulingApi};
use super::jobs::SyncJobRepository;
use super::retry::call_with_retry;

/// Longest lookback a job may request.
pub const MAX_LOOKBACK_DAYS: u32 = 366;

/// Parameters of one sync job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// What to pull.
    pub entity: SyncEntity,
    /// Days before `as_of` to pull; defaults to the configured lookback.
    #[serde(default)]
    pub lookback_days: Option<u32>,
    /// Centre to narrow the pull to.
    #[serde(default)]
    pub centre_code: Option<String>,
    /// What started the job.
    #[serde(default = "manual")]
    pub trigger: TriggerSource,
    /// Last day of the window; defaults to today (UTC).
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

fn manual() -> TriggerSource {
    TriggerSource::Manual
}

impl SyncRequest {
    /// A manual job with default lookback over every centre.
    pub fn manual(entity: SyncEntity) -> Self {
        Self {
            entity,
            lookback_days: None,
            centre_code: None,
            trigger: TriggerSource::Manual,
            as_of: None,
        }
    }
}

/// A validated request with its resolved scope.
#[derive(Debug, Clone)]
struct JobPlan {
    entity: SyncEntity,
    window: PeriodWindow,
    query: FetchQuery,
    /// Scheduling site ID to internal centre code.
    sites: HashMap<String, String>,
}

/// Typed rows of one fetched phase.
enum PhaseFetch {
    Employees(Vec<EmployeeRow>),
    Schedules(Vec<ScheduleRow>),
    Absences(Vec<AbsenceRow>),
}

/// Pulls external scheduling data into the record store.
pub struct SyncOrchestrator {
    api: Arc<dyn SchedulingApi>,
    store: Arc<MemoryStore>,
    config: SyncConfig,
    reconciler: BatchReconciler,
    jobs: Arc<SyncJobRepository>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator. The chunk size comes from `config`.
    pub fn new(
        api: Arc<dyn SchedulingApi>,
        store: Arc<MemoryStore>,
        config: SyncConfig,
        jobs: Arc<SyncJobRepository>,
    ) -> Self {
        let reconciler = BatchReconciler::new(config.chunk_size);
        Self {
            api,
            store,
            config,
            reconciler,
            jobs,
        }
    }

    /// Returns the job repository.
    pub fn jobs(&self) -> &Arc<SyncJobRepository> {
        &self.jobs
    }

    /// Returns the sync configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Validates a request and opens its job log in `running`.
    pub fn start(&self, request: &SyncRequest) -> EngineResult<SyncJobLog> {
        self.plan(request)?;
        let job = SyncJobLog::start(
            request.entity,
            request.trigger,
            Some(self.lookback(request)),
            request.centre_code.clone(),
        );
        self.jobs.insert(job.clone());
        info!(
            job_id = %job.id,
            entity = %request.entity,
            trigger = %request.trigger,
            centre_code = ?request.centre_code,
            "Sync job started"
        );
        Ok(job)
    }

    /// Runs every phase of an opened job and finalizes it.
    ///
    /// The request is planned again against the current store. If it no
    /// longer plans (its centre lost the scheduling site ID, for instance)
    /// the job is finalized as `failed` with the reason recorded.
    pub async fn execute(&self, job_id: Uuid, request: &SyncRequest) -> EngineResult<SyncJobLog> {
        let plan = match self.plan(request) {
            Ok(plan) => plan,
            Err(error) => {
                warn!(job_id = %job_id, error = %error, "Sync request no longer valid, failing job");
                return self.jobs.update(job_id, |job| {
                    if !job.is_finalized() {
                        job.record_failed_phase(request.entity, error.to_string());
                        job.finalize(false)?;
                    }
                    Ok::<_, EngineError>(job.clone())
                })?;
            }
        };
        let mut api_reached = false;

        for &phase in plan.entity.phases() {
            if self.jobs.get(job_id)?.is_finalized() {
                warn!(job_id = %job_id, phase = %phase, "Sync job cancelled, skipping remaining phases");
                return self.jobs.get(job_id);
            }

            match self.fetch(phase, &plan).await {
                Ok(fetched) => {
                    api_reached = true;
                    let report = self.write(fetched);
                    self.jobs.update(job_id, |job| record_phase(job, phase, &report))?;
                    info!(
                        job_id = %job_id,
                        phase = %phase,
                        inserted = report.inserted,
                        updated = report.updated,
                        errored = report.errored,
                        "Sync phase completed"
                    );
                }
                Err(error) => {
                    warn!(job_id = %job_id, phase = %phase, error = %error, "Sync phase failed");
                    self.jobs.update(job_id, |job| {
                        if !job.is_finalized() {
                            job.record_failed_phase(phase, error.to_string());
                        }
                    })?;
                }
            }
        }

        let job = self.jobs.update(job_id, |job| {
            if !job.is_finalized() {
                job.finalize(api_reached)?;
            }
            Ok::<_, EngineError>(job.clone())
        })??;

        info!(
            job_id = %job.id,
            status = ?job.status,
            total = job.total_rows,
            errors = job.error_rows,
            "Sync job finished"
        );
        Ok(job)
    }

    /// Starts and runs a job to completion.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use workforce_sync::config::ConfigLoader;
    /// use workforce_sync::models::SyncEntity;
    /// use workforce_sync::store::MemoryStore;
    /// use workforce_sync::sync::{
    ///     FixtureSchedulingApi, SyncJobRepository, SyncOrchestrator, SyncRequest,
    /// };
    ///
    /// # async fn example() -> workforce_sync::error::EngineResult<()> {
    /// let config = ConfigLoader::load("./config/default")?;
    /// let orchestrator = SyncOrchestrator::new(
    ///     Arc::new(FixtureSchedulingApi::default()),
    ///     Arc::new(MemoryStore::new()),
    ///     config.sync().clone(),
    ///     Arc::new(SyncJobRepository::new()),
    /// );
    ///
    /// let job = orchestrator.run(&SyncRequest::manual(SyncEntity::Full)).await?;
    /// println!("{:?}: {} rows", job.status, job.total_rows);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, request: &SyncRequest) -> EngineResult<SyncJobLog> {
        let job = self.start(request)?;
        self.execute(job.id, request).await
    }

    /// Cancels a running job.
    pub fn cancel(&self, job_id: Uuid, reason: &str) -> EngineResult<SyncJobLog> {
        self.jobs.cancel(job_id, reason)
    }

    fn lookback(&self, request: &SyncRequest) -> u32 {
        request
            .lookback_days
            .unwrap_or(self.config.default_lookback_days)
    }

    fn plan(&self, request: &SyncRequest) -> EngineResult<JobPlan> {
        let lookback = self.lookback(request);
        if lookback > MAX_LOOKBACK_DAYS {
            return Err(EngineError::InvalidSyncRequest {
                message: format!("lookback of {lookback} days exceeds {MAX_LOOKBACK_DAYS}"),
            });
        }

        let centres = self.store.centres();
        let site_id = match &request.centre_code {
            None => None,
            Some(code) => {
                let centre = centres.iter().find(|c| &c.code == code).ok_or_else(|| {
                    EngineError::InvalidSyncRequest {
                        message: format!("unknown centre '{code}'"),
                    }
                })?;
                let site = centre.scheduling_site_id.clone().ok_or_else(|| {
                    EngineError::InvalidSyncRequest {
                        message: format!("centre '{code}' has no scheduling site ID"),
                    }
                })?;
                Some(site)
            }
        };

        let as_of = request.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let window = PeriodWindow::trailing(as_of, lookback);
        let sites = centres
            .into_iter()
            .filter_map(|c| c.scheduling_site_id.map(|site| (site, c.code)))
            .collect();

        Ok(JobPlan {
            entity: request.entity,
            window,
            query: FetchQuery {
                business_id: self.config.api.business_id.clone(),
                service_id: self.config.api.service_id.clone(),
                range: None,
                site_id,
            },
            sites,
        })
    }

    async fn fetch(&self, phase: SyncEntity, plan: &JobPlan) -> Result<PhaseFetch, ExternalApiError> {
        let retry = &self.config.retry;
        let timeout = self.config.timeout();
        let query = FetchQuery {
            range: phase.uses_lookback().then_some(plan.window),
            ..plan.query.clone()
        };
        let centre_of = |site: Option<&String>| site.and_then(|site| plan.sites.get(site)).cloned();

        let fetched = match phase {
            SyncEntity::Employees => {
                let records =
                    call_with_retry(retry, timeout, "list_employees", || self.api.list_employees(&query))
                        .await?;
                PhaseFetch::Employees(
                    records
                        .into_iter()
                        .map(|e| EmployeeRow {
                            centre_code: centre_of(e.site_id.as_ref()),
                            scheduling_id: Some(e.id),
                            payroll_code: e.payroll_code,
                            display_name: e.name,
                            email: e.email,
                            active_from: e.start_date,
                            active_to: e.end_date,
                        })
                        .collect(),
                )
            }
            SyncEntity::Schedules => {
                let records =
                    call_with_retry(retry, timeout, "list_schedules", || self.api.list_schedules(&query))
                        .await?;
                PhaseFetch::Schedules(
                    records
                        .into_iter()
                        .map(|s| ScheduleRow {
                            centre_code: centre_of(s.site_id.as_ref()),
                            external_id: s.id,
                            employee: EmployeeRef::SchedulingId(s.employee_id),
                            date: s.date,
                            planned_hours: s.hours,
                            provenance: Provenance::Synchronized,
                        })
                        .collect(),
                )
            }
            // Full is expanded into its phases before fetching.
            SyncEntity::Absences | SyncEntity::Full => {
                let records =
                    call_with_retry(retry, timeout, "list_absences", || self.api.list_absences(&query))
                        .await?;
                PhaseFetch::Absences(
                    records
                        .into_iter()
                        .map(|a| AbsenceRow {
                            external_id: a.id,
                            employee: EmployeeRef::SchedulingId(a.employee_id),
                            kind: a.kind,
                            start_date: a.start_date,
                            end_date: a.end_date,
                            provenance: Provenance::Synchronized,
                        })
                        .collect(),
                )
            }
        };
        Ok(fetched)
    }

    fn write(&self, fetched: PhaseFetch) -> ReconcileReport {
        let store = self.store.as_ref();
        match fetched {
            PhaseFetch::Employees(rows) => self.reconciler.reconcile(store, &rows, WriteStrategy::Upsert),
            PhaseFetch::Schedules(rows) => self.reconciler.reconcile(store, &rows, WriteStrategy::Upsert),
            PhaseFetch::Absences(rows) => self.reconciler.reconcile(store, &rows, WriteStrategy::Upsert),
        }
    }
}

fn record_phase(job: &mut SyncJobLog, phase: SyncEntity, report: &ReconcileReport) {
    if job.is_finalized() {
        return;
    }
    job.record_counts(report.inserted, report.updated, report.skipped, report.errored);
    for error in &report.errors {
        job.push_error(SyncErrorEntry {
            kind: SyncErrorKind::Row,
            entity: phase,
            identifier: error.key.clone(),
            message: error.message.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DailyScheduleConfig, ExternalApiConfig, RetryConfig};
    use crate::models::SyncStatus;
    use crate::reconcile::{CentreRow, PayrollRow};
    use crate::sync::client::{
        ExternalAbsence, ExternalEmployee, ExternalSchedule, FixtureSchedulingApi,
    };
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn config(timeout_ms: u64) -> SyncConfig {
        SyncConfig {
            api: ExternalApiConfig {
                base_url: "http://fixture".to_string(),
                business_id: "business".to_string(),
                service_id: "service".to_string(),
                api_key: None,
            },
            timeout_ms,
            retry: RetryConfig {
                max_retries: 1,
                initial_backoff_ms: 1,
                backoff_multiplier: 2.0,
                max_backoff_ms: 2,
            },
            chunk_size: 2,
            default_lookback_days: 30,
            schedule: DailyScheduleConfig::default(),
        }
    }

    fn employee(id: &str, site: &str) -> ExternalEmployee {
        ExternalEmployee {
            id: id.to_string(),
            name: format!("Empleado {id}"),
            payroll_code: None,
            site_id: Some(site.to_string()),
            email: None,
            start_date: None,
            end_date: None,
        }
    }

    fn schedule(id: &str, employee_id: &str, site: &str, day: u32) -> ExternalSchedule {
        ExternalSchedule {
            id: id.to_string(),
            employee_id: employee_id.to_string(),
            site_id: Some(site.to_string()),
            date: date(day),
            hours: Decimal::new(8, 0),
        }
    }

    fn fixture() -> Arc<FixtureSchedulingApi> {
        Arc::new(FixtureSchedulingApi::new(
            vec![
                employee("E1", "SITE-A"),
                employee("E2", "SITE-A"),
                employee("E3", "SITE-B"),
            ],
            vec![
                schedule("SH1", "E1", "SITE-A", 10),
                schedule("SH2", "E2", "SITE-A", 11),
                schedule("SH3", "E3", "SITE-B", 12),
                schedule("SH-OLD", "E1", "SITE-A", 1),
            ],
            vec![ExternalAbsence {
                id: "AB1".to_string(),
                employee_id: "E1".to_string(),
                kind: "vacaciones".to_string(),
                start_date: date(12),
                end_date: date(14),
            }],
        ))
    }

    fn orchestrator(api: Arc<FixtureSchedulingApi>, timeout_ms: u64) -> (SyncOrchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let centres = [("MAD01", "SITE-A"), ("BCN01", "SITE-B")].map(|(code, site)| CentreRow {
            code: code.to_string(),
            name: code.to_string(),
            scheduling_site_id: Some(site.to_string()),
            payroll_site_code: None,
            city: None,
            email: None,
            opened_on: None,
        });
        BatchReconciler::default().reconcile(store.as_ref(), &centres, WriteStrategy::Upsert);

        let orchestrator = SyncOrchestrator::new(
            api,
            Arc::clone(&store),
            config(timeout_ms),
            Arc::new(SyncJobRepository::new()),
        );
        (orchestrator, store)
    }

    fn full_request() -> SyncRequest {
        SyncRequest {
            lookback_days: Some(7),
            as_of: Some(date(15)),
            ..SyncRequest::manual(SyncEntity::Full)
        }
    }

    #[tokio::test]
    async fn test_full_sync_completes() {
        let (orchestrator, store) = orchestrator(fixture(), 1000);

        let job = orchestrator.run(&full_request()).await.unwrap();

        assert_eq!(job.status, SyncStatus::Completed);
        // 3 employees, 3 schedules inside the window, 1 absence
        assert_eq!(job.inserted_rows, 7);
        assert_eq!(job.total_rows, 7);
        assert!(job.finished_at.is_some());

        let e1 = store.identities().find_by_scheduling_id("E1").unwrap();
        assert_eq!(e1.centre_code.as_deref(), Some("MAD01"));
    }

    #[tokio::test]
    async fn test_absence_timeout_yields_partial() {
        let api = fixture();
        api.delay(SyncEntity::Absences, Duration::from_millis(200));
        let (orchestrator, _) = orchestrator(Arc::clone(&api), 20);

        let job = orchestrator.run(&full_request()).await.unwrap();

        assert_eq!(job.status, SyncStatus::Partial);
        assert!(job.error_rows > 0);
        assert_eq!(job.inserted_rows, 6);
        assert_eq!(api.calls(SyncEntity::Absences), 2);

        let api_errors: Vec<_> = job
            .errors
            .iter()
            .filter(|e| e.kind == SyncErrorKind::Api)
            .collect();
        assert_eq!(api_errors.len(), 1);
        assert_eq!(api_errors[0].entity, SyncEntity::Absences);
        assert!(api_errors[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unreachable_api_fails_job() {
        let api = fixture();
        for entity in [SyncEntity::Employees, SyncEntity::Schedules, SyncEntity::Absences] {
            api.fail(
                entity,
                ExternalApiError::Unreachable {
                    message: "connection refused".to_string(),
                },
            );
        }
        let (orchestrator, store) = orchestrator(api, 1000);

        let job = orchestrator.run(&full_request()).await.unwrap();

        assert_eq!(job.status, SyncStatus::Failed);
        assert_eq!(job.error_rows, 3);
        assert!(store.employees().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let (orchestrator, store) = orchestrator(fixture(), 1000);
        orchestrator.run(&full_request()).await.unwrap();
        let employees = store.employees();

        let second = orchestrator.run(&full_request()).await.unwrap();

        assert_eq!(second.status, SyncStatus::Completed);
        assert_eq!(second.inserted_rows, 0);
        assert_eq!(second.updated_rows, 7);
        assert_eq!(store.employees(), employees);
        assert_eq!(orchestrator.jobs().list(None, None).len(), 2);
    }

    #[tokio::test]
    async fn test_schedules_for_unknown_employees_are_row_errors() {
        let (orchestrator, _) = orchestrator(fixture(), 1000);
        let request = SyncRequest {
            entity: SyncEntity::Schedules,
            ..full_request()
        };

        let job = orchestrator.run(&request).await.unwrap();

        assert_eq!(job.status, SyncStatus::Failed);
        assert_eq!(job.error_rows, 3);
        assert!(job.errors.iter().all(|e| e.kind == SyncErrorKind::Row));
        assert_eq!(job.errors[0].identifier, "schedule:SH1");
    }

    #[tokio::test]
    async fn test_centre_scope_narrows_pull() {
        let (orchestrator, store) = orchestrator(fixture(), 1000);
        let request = SyncRequest {
            centre_code: Some("BCN01".to_string()),
            ..full_request()
        };

        let job = orchestrator.run(&request).await.unwrap();

        assert_eq!(job.status, SyncStatus::Completed);
        assert_eq!(job.inserted_rows, 2);
        assert_eq!(store.employees().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let (orchestrator, _) = orchestrator(fixture(), 1000);

        let unknown_centre = SyncRequest {
            centre_code: Some("XXX".to_string()),
            ..full_request()
        };
        assert!(matches!(
            orchestrator.run(&unknown_centre).await,
            Err(EngineError::InvalidSyncRequest { .. })
        ));

        let too_long = SyncRequest {
            lookback_days: Some(MAX_LOOKBACK_DAYS + 1),
            ..full_request()
        };
        assert!(orchestrator.start(&too_long).is_err());
        assert!(orchestrator.jobs().list(None, None).is_empty());
    }

    #[tokio::test]
    async fn test_employee_sync_matches_payroll_imported_employee() {
        let mut synced = employee("E1", "SITE-A");
        synced.payroll_code = Some("N-1".to_string());
        let api = Arc::new(FixtureSchedulingApi::new(vec![synced], vec![], vec![]));
        let (orchestrator, store) = orchestrator(api, 1000);
        let payroll = PayrollRow {
            payroll_code: "N-1".to_string(),
            employee_name: Some("Nuevo".to_string()),
            centre_code: Some("MAD01".to_string()),
            period: PeriodWindow::month_of(date(1)),
            worked_hours: Decimal::new(160, 0),
            gross_cost: Decimal::new(2400, 0),
            provenance: Provenance::Manual,
        };
        BatchReconciler::default().reconcile(store.as_ref(), &[payroll], WriteStrategy::Upsert);
        let imported = store.identities().find_by_payroll_code("N-1").unwrap();
        let request = SyncRequest {
            as_of: Some(date(15)),
            ..SyncRequest::manual(SyncEntity::Employees)
        };

        let first = orchestrator.run(&request).await.unwrap();
        let second = orchestrator.run(&request).await.unwrap();

        assert_eq!(first.status, SyncStatus::Completed);
        assert_eq!(first.inserted_rows, 0);
        assert_eq!(first.updated_rows, 1);
        assert_eq!(second.status, SyncStatus::Completed);
        assert_eq!(store.employees().len(), 1);
        let matched = store.identities().find_by_scheduling_id("E1").unwrap();
        assert_eq!(matched.id, imported.id);
    }

    #[tokio::test]
    async fn test_request_invalidated_after_start_fails_job() {
        let (orchestrator, store) = orchestrator(fixture(), 1000);
        let request = SyncRequest {
            centre_code: Some("MAD01".to_string()),
            ..full_request()
        };
        let job = orchestrator.start(&request).unwrap();

        let unlinked = CentreRow {
            code: "MAD01".to_string(),
            name: "MAD01".to_string(),
            scheduling_site_id: None,
            payroll_site_code: None,
            city: None,
            email: None,
            opened_on: None,
        };
        BatchReconciler::default().reconcile(store.as_ref(), &[unlinked], WriteStrategy::Upsert);

        let finished = orchestrator.execute(job.id, &request).await.unwrap();

        assert_eq!(finished.status, SyncStatus::Failed);
        assert!(finished.finished_at.is_some());
        assert_eq!(finished.errors.len(), 1);
        assert!(finished.errors[0].message.contains("no scheduling site ID"));
        assert_eq!(orchestrator.jobs().get(job.id).unwrap().status, SyncStatus::Failed);
        assert!(store.employees().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_remaining_phases() {
        let api = fixture();
        api.delay(SyncEntity::Schedules, Duration::from_millis(100));
        let (orchestrator, _) = orchestrator(Arc::clone(&api), 1000);
        let orchestrator = Arc::new(orchestrator);

        let request = full_request();
        let job = orchestrator.start(&request).unwrap();
        let running = {
            let orchestrator = Arc::clone(&orchestrator);
            let request = request.clone();
            tokio::spawn(async move { orchestrator.execute(job.id, &request).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        orchestrator.cancel(job.id, "stopped by user").unwrap();
        let finished = running.await.unwrap().unwrap();

        assert_eq!(finished.status, SyncStatus::Failed);
        assert!(finished.errors.iter().any(|e| e.kind == SyncErrorKind::Cancelled));
        assert_eq!(api.calls(SyncEntity::Absences), 0);
        // Employees written before the cancellation are kept in the log.
        assert_eq!(finished.inserted_rows, 3);
    }
}
