//! CSV exports of the audit read models.
//!
//! Exports use human-readable headers and labels rather than wire codes, so
//! they open cleanly in a spreadsheet.

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AlertNotification, DataQualityIssue, Severity, SyncEntity, SyncJobLog, SyncStatus,
    TriggerSource,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn entity_label(entity: SyncEntity) -> &'static str {
    match entity {
        SyncEntity::Employees => "Employees",
        SyncEntity::Schedules => "Schedules",
        SyncEntity::Absences => "Absences",
        SyncEntity::Full => "Full sync",
    }
}

fn trigger_label(trigger: TriggerSource) -> &'static str {
    match trigger {
        TriggerSource::Manual => "Manual",
        TriggerSource::Cron => "Scheduled",
    }
}

fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Running => "Running",
        SyncStatus::Completed => "Completed",
        SyncStatus::Partial => "Partially completed",
        SyncStatus::Failed => "Failed",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critica => "Critical",
        Severity::Alta => "High",
        Severity::Media => "Medium",
        Severity::Baja => "Low",
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

fn write_csv<const N: usize>(header: [&str; N], rows: Vec<[String; N]>) -> EngineResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header).map_err(|e| EngineError::ExportError {
        message: format!("CSV write error: {e}"),
    })?;
    for row in rows {
        writer.write_record(&row).map_err(|e| EngineError::ExportError {
            message: format!("CSV write error: {e}"),
        })?;
    }
    let bytes = writer.into_inner().map_err(|e| EngineError::ExportError {
        message: format!("CSV flush error: {e}"),
    })?;
    String::from_utf8(bytes).map_err(|e| EngineError::ExportError {
        message: format!("CSV encoding error: {e}"),
    })
}

/// Exports sync job logs, one row per job. Errors are joined into one cell.
pub fn sync_jobs_csv(jobs: &[SyncJobLog]) -> EngineResult<String> {
    let rows = jobs
        .iter()
        .map(|job| {
            [
                job.id.to_string(),
                entity_label(job.entity).to_string(),
                trigger_label(job.trigger).to_string(),
                status_label(job.status).to_string(),
                job.started_at.format(TIMESTAMP_FORMAT).to_string(),
                job.finished_at
                    .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_default(),
                job.centre_code.clone().unwrap_or_default(),
                job.total_rows.to_string(),
                job.inserted_rows.to_string(),
                job.updated_rows.to_string(),
                job.skipped_rows.to_string(),
                job.error_rows.to_string(),
                job.errors
                    .iter()
                    .map(|error| format!("{}: {}", error.identifier, error.message))
                    .collect::<Vec<_>>()
                    .join("; "),
            ]
        })
        .collect();

    write_csv(
        [
            "Job ID",
            "Entity",
            "Trigger",
            "Status",
            "Started",
            "Finished",
            "Centre",
            "Total rows",
            "Inserted",
            "Updated",
            "Skipped",
            "Errors",
            "Error details",
        ],
        rows,
    )
}

/// Exports data quality issues.
pub fn issues_csv(issues: &[DataQualityIssue]) -> EngineResult<String> {
    let rows = issues
        .iter()
        .map(|issue| {
            [
                issue.id.to_string(),
                issue.kind.label().to_string(),
                severity_label(issue.severity).to_string(),
                issue.centre_code.clone().unwrap_or_default(),
                issue.subject.clone(),
                issue.period.start.to_string(),
                issue.period.end.to_string(),
                issue.detail.to_string(),
                issue.detected_at.format(TIMESTAMP_FORMAT).to_string(),
                yes_no(issue.resolved).to_string(),
                issue
                    .resolved_at
                    .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();

    write_csv(
        [
            "Issue ID",
            "Type",
            "Severity",
            "Centre",
            "Subject",
            "Period start",
            "Period end",
            "Detail",
            "Detected",
            "Resolved",
            "Resolved at",
        ],
        rows,
    )
}

/// Exports alert notifications.
pub fn notifications_csv(notifications: &[AlertNotification]) -> EngineResult<String> {
    let rows = notifications
        .iter()
        .map(|notification| {
            [
                notification.id.to_string(),
                notification.rule_name.clone(),
                notification.kind.label().to_string(),
                notification.centre_code.clone().unwrap_or_default(),
                notification.period.start.to_string(),
                notification.period.end.to_string(),
                notification.value.to_string(),
                format!("{} {}", notification.operator, notification.threshold),
                notification
                    .channels
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                notification.created_at.format(TIMESTAMP_FORMAT).to_string(),
                yes_no(notification.read).to_string(),
            ]
        })
        .collect();

    write_csv(
        [
            "Notification ID",
            "Rule",
            "Metric",
            "Centre",
            "Period start",
            "Period end",
            "Value",
            "Condition",
            "Channels",
            "Created",
            "Read",
        ],
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AlertKind, Channel, ComparisonOperator, IssueKind, PeriodWindow, SyncErrorEntry,
        SyncErrorKind,
    };
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;
    use uuid::Uuid;

    fn march() -> PeriodWindow {
        PeriodWindow::month_of(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
    }

    fn read(csv_text: &str) -> Vec<csv::StringRecord> {
        csv::Reader::from_reader(csv_text.as_bytes())
            .records()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_sync_jobs_csv_uses_labels() {
        let mut job = SyncJobLog::start(SyncEntity::Full, TriggerSource::Cron, Some(7), None);
        job.push_error(SyncErrorEntry {
            kind: SyncErrorKind::Api,
            entity: SyncEntity::Absences,
            identifier: "absences".to_string(),
            message: "timed out, contains, commas".to_string(),
        });

        let text = sync_jobs_csv(&[job]).unwrap();

        assert!(text.starts_with("Job ID,Entity,Trigger,Status"));
        let records = read(&text);
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][1], "Full sync");
        assert_eq!(&records[0][2], "Scheduled");
        assert_eq!(&records[0][3], "Running");
        assert_eq!(&records[0][12], "absences: timed out, contains, commas");
    }

    #[test]
    fn test_issues_csv() {
        let issue = DataQualityIssue {
            id: Uuid::new_v4(),
            kind: IssueKind::PlanSinReal,
            severity: Severity::Media,
            subject: "emp-1".to_string(),
            employee_id: None,
            centre_code: Some("MAD01".to_string()),
            period: march(),
            detail: json!({"gap_hours": "8"}),
            detected_at: Utc::now(),
            last_seen_at: Utc::now(),
            resolved: false,
            resolved_at: None,
        };

        let records = read(&issues_csv(&[issue]).unwrap());

        assert_eq!(&records[0][1], "Planned hours without payroll");
        assert_eq!(&records[0][2], "Medium");
        assert_eq!(&records[0][5], "2025-03-01");
        assert_eq!(&records[0][9], "No");
    }

    #[test]
    fn test_notifications_csv() {
        let notification = AlertNotification {
            id: Uuid::new_v4(),
            rule_id: Uuid::new_v4(),
            rule_name: "Coste".to_string(),
            kind: AlertKind::LaborCost,
            centre_code: None,
            period: march(),
            value: Decimal::new(2480, 0),
            threshold: Decimal::new(2000, 0),
            operator: ComparisonOperator::GreaterThan,
            channels: vec![Channel::InApp, Channel::Email],
            message: String::new(),
            created_at: Utc::now(),
            read: true,
        };

        let records = read(&notifications_csv(&[notification]).unwrap());

        assert_eq!(&records[0][2], "Labour cost");
        assert_eq!(&records[0][7], "> 2000");
        assert_eq!(&records[0][8], "in_app, email");
        assert_eq!(&records[0][10], "Yes");
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let text = issues_csv(&[]).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
