//! Sync job log repository.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{SyncEntity, SyncJobLog, SyncStatus};

#[derive(Debug, Default)]
struct JobTable {
    jobs: HashMap<Uuid, SyncJobLog>,
    order: Vec<Uuid>,
}

/// Stores sync job logs in creation order.
#[derive(Debug, Default)]
pub struct SyncJobRepository {
    table: Mutex<JobTable>,
}

impl SyncJobRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a new job.
    pub fn insert(&self, job: SyncJobLog) {
        let mut table = self.lock();
        if table.jobs.insert(job.id, job.clone()).is_none() {
            table.order.push(job.id);
        }
    }

    /// Returns a job by ID.
    pub fn get(&self, job_id: Uuid) -> EngineResult<SyncJobLog> {
        self.lock()
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(EngineError::JobNotFound { job_id })
    }

    /// Runs `f` against a stored job.
    pub fn update<R>(&self, job_id: Uuid, f: impl FnOnce(&mut SyncJobLog) -> R) -> EngineResult<R> {
        let mut table = self.lock();
        let job = table
            .jobs
            .get_mut(&job_id)
            .ok_or(EngineError::JobNotFound { job_id })?;
        Ok(f(job))
    }

    /// Cancels a running job. It becomes `failed` immediately; rows already
    /// written stay written.
    pub fn cancel(&self, job_id: Uuid, reason: &str) -> EngineResult<SyncJobLog> {
        let job = self.update(job_id, |job| job.cancel(reason).map(|()| job.clone()))??;
        info!(job_id = %job_id, reason, "Sync job cancelled");
        Ok(job)
    }

    /// Lists jobs newest first, optionally filtered.
    pub fn list(&self, entity: Option<SyncEntity>, status: Option<SyncStatus>) -> Vec<SyncJobLog> {
        let table = self.lock();
        table
            .order
            .iter()
            .rev()
            .filter_map(|id| table.jobs.get(id))
            .filter(|job| entity.is_none_or(|entity| job.entity == entity))
            .filter(|job| status.is_none_or(|status| job.status == status))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TriggerSource;

    fn job(entity: SyncEntity) -> SyncJobLog {
        SyncJobLog::start(entity, TriggerSource::Manual, Some(7), None)
    }

    #[test]
    fn test_list_is_newest_first_and_filtered() {
        let repository = SyncJobRepository::new();
        let first = job(SyncEntity::Employees);
        let second = job(SyncEntity::Full);
        repository.insert(first.clone());
        repository.insert(second.clone());

        let all = repository.list(None, None);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        let full = repository.list(Some(SyncEntity::Full), Some(SyncStatus::Running));
        assert_eq!(full.len(), 1);
        assert!(repository.list(None, Some(SyncStatus::Completed)).is_empty());
    }

    #[test]
    fn test_cancel_twice_fails() {
        let repository = SyncJobRepository::new();
        let running = job(SyncEntity::Schedules);
        repository.insert(running.clone());

        let cancelled = repository.cancel(running.id, "stopped by user").unwrap();
        assert_eq!(cancelled.status, SyncStatus::Failed);

        let again = repository.cancel(running.id, "again");
        assert!(matches!(again, Err(EngineError::JobAlreadyFinalized { .. })));
    }

    #[test]
    fn test_unknown_job() {
        let repository = SyncJobRepository::new();
        assert!(matches!(
            repository.get(Uuid::new_v4()),
            Err(EngineError::JobNotFound { .. })
        ));
    }
}
