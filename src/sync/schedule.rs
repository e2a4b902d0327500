//! The unattended daily sync.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::DailyScheduleConfig;
use crate::models::{SyncEntity, TriggerSource};

use super::orchestrator::{SyncOrchestrator, SyncRequest};

/// When the daily job runs and how far back it looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
    lookback_days: u32,
}

impl DailySchedule {
    /// Builds the schedule from configuration. Out-of-range times fall back
    /// to midnight.
    pub fn from_config(config: &DailyScheduleConfig) -> Self {
        Self {
            time: NaiveTime::from_hms_opt(config.hour, config.minute, 0).unwrap_or(NaiveTime::MIN),
            lookback_days: config.lookback_days,
        }
    }

    /// Returns the first run strictly after `now`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use workforce_sync::config::DailyScheduleConfig;
    /// use workforce_sync::sync::DailySchedule;
    ///
    /// let schedule = DailySchedule::from_config(&DailyScheduleConfig::default());
    /// let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
    /// assert_eq!(
    ///     schedule.next_run_after(now),
    ///     Utc.with_ymd_and_hms(2025, 3, 11, 3, 0, 0).unwrap()
    /// );
    /// ```
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.time).and_utc();
        if today > now {
            return today;
        }
        now.date_naive()
            .checked_add_days(Days::new(1))
            .map_or(today, |tomorrow| tomorrow.and_time(self.time).and_utc())
    }

    /// The request the daily job submits: a full pull over every centre with
    /// the fixed lookback.
    pub fn request(&self, now: DateTime<Utc>) -> SyncRequest {
        SyncRequest {
            entity: SyncEntity::Full,
            lookback_days: Some(self.lookback_days),
            centre_code: None,
            trigger: TriggerSource::Cron,
            as_of: Some(now.date_naive()),
        }
    }
}

/// Runs the daily job until `shutdown` flips to `true`.
///
/// A failing job is logged and the loop waits for the next day.
pub async fn run_daily(
    orchestrator: Arc<SyncOrchestrator>,
    schedule: DailySchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let next = schedule.next_run_after(now);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next_run = %next, "Daily sync scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Daily sync stopped");
                    return;
                }
                continue;
            }
        }

        match orchestrator.run(&schedule.request(Utc::now())).await {
            Ok(job) => info!(job_id = %job.id, status = ?job.status, "Daily sync finished"),
            Err(e) => error!(error = %e, "Daily sync could not start"),
        }
    }
}
