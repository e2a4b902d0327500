//! The data quality issue log.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{DataQualityIssue, IssueKey, IssueKind, PeriodWindow, Severity};

use super::rules::Finding;

/// What an upsert did to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueUpsert {
    /// A new issue was opened.
    Created,
    /// An open issue with the same key was refreshed.
    Refreshed,
}

/// Filters for listing issues. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IssueFilter {
    /// Restrict to one anomaly class.
    pub kind: Option<IssueKind>,
    /// Restrict to one severity.
    pub severity: Option<Severity>,
    /// Restrict to one centre.
    pub centre_code: Option<String>,
    /// Only unresolved issues.
    #[serde(default)]
    pub open_only: bool,
    /// Only issues whose period overlaps this window.
    #[serde(skip)]
    pub period: Option<PeriodWindow>,
}

impl IssueFilter {
    fn matches(&self, issue: &DataQualityIssue) -> bool {
        self.kind.is_none_or(|kind| issue.kind == kind)
            && self.severity.is_none_or(|severity| issue.severity == severity)
            && self
                .centre_code
                .as_deref()
                .is_none_or(|code| issue.centre_code.as_deref() == Some(code))
            && (!self.open_only || issue.is_open())
            && self.period.is_none_or(|period| issue.period.overlaps(&period))
    }
}

#[derive(Debug, Default)]
struct IssueTable {
    issues: Vec<DataQualityIssue>,
    open: HashMap<IssueKey, usize>,
}

/// Stores data quality issues, keeping at most one open issue per key.
#[derive(Debug, Default)]
pub struct IssueRepository {
    table: Mutex<IssueTable>,
}

impl IssueRepository {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IssueTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a finding for `period`.
    ///
    /// An open issue with the same key has its severity, detail and
    /// `last_seen_at` refreshed. Otherwise a new issue is opened, including
    /// when the previous one for the key was resolved.
    pub fn upsert(&self, finding: Finding, period: PeriodWindow, now: DateTime<Utc>) -> IssueUpsert {
        let key = IssueKey {
            kind: finding.kind,
            subject: finding.subject.clone(),
            centre_code: finding.centre_code.clone(),
            period,
        };
        let mut table = self.lock();

        if let Some(&index) = table.open.get(&key) {
            let issue = &mut table.issues[index];
            issue.severity = finding.severity;
            issue.employee_id = finding.employee_id;
            issue.detail = finding.detail;
            issue.last_seen_at = now;
            return IssueUpsert::Refreshed;
        }

        let issue = DataQualityIssue {
            id: Uuid::new_v4(),
            kind: finding.kind,
            severity: finding.severity,
            subject: finding.subject,
            employee_id: finding.employee_id,
            centre_code: finding.centre_code,
            period,
            detail: finding.detail,
            detected_at: now,
            last_seen_at: now,
            resolved: false,
            resolved_at: None,
        };
        let index = table.issues.len();
        table.issues.push(issue);
        table.open.insert(key, index);
        IssueUpsert::Created
    }

    /// Returns an issue by ID.
    pub fn get(&self, issue_id: Uuid) -> EngineResult<DataQualityIssue> {
        self.lock()
            .issues
            .iter()
            .find(|issue| issue.id == issue_id)
            .cloned()
            .ok_or(EngineError::IssueNotFound { issue_id })
    }

    /// Marks an issue resolved.
    pub fn resolve(&self, issue_id: Uuid, at: DateTime<Utc>) -> EngineResult<DataQualityIssue> {
        let mut table = self.lock();
        let issue = table
            .issues
            .iter_mut()
            .find(|issue| issue.id == issue_id)
            .ok_or(EngineError::IssueNotFound { issue_id })?;
        issue.resolve(at)?;
        let resolved = issue.clone();
        table.open.remove(&resolved.key());
        Ok(resolved)
    }

    /// Lists issues, most urgent first, then most recently seen.
    pub fn list(&self, filter: &IssueFilter) -> Vec<DataQualityIssue> {
        let mut issues: Vec<DataQualityIssue> = self
            .lock()
            .issues
            .iter()
            .filter(|issue| filter.matches(issue))
            .cloned()
            .collect();
        issues.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
        });
        issues
    }

    /// Counts open issues matching the filter.
    pub fn open_count(&self, filter: &IssueFilter) -> usize {
        self.lock()
            .issues
            .iter()
            .filter(|issue| issue.is_open() && filter.matches(issue))
            .count()
    }

    /// Total number of issues ever opened.
    pub fn len(&self) -> usize {
        self.lock().issues.len()
    }

    /// Returns true if no issue was ever opened.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    fn march() -> PeriodWindow {
        PeriodWindow::month_of(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
    }

    fn finding(severity: Severity) -> Finding {
        Finding {
            kind: IssueKind::PlanSinReal,
            severity,
            subject: "emp-1".to_string(),
            employee_id: None,
            centre_code: Some("MAD01".to_string()),
            detail: json!({"gap_hours": 8}),
        }
    }

    #[test]
    fn test_upsert_refreshes_open_issue() {
        let repository = IssueRepository::new();
        let first = Utc::now();
        let later = first + Duration::hours(1);

        assert_eq!(
            repository.upsert(finding(Severity::Media), march(), first),
            IssueUpsert::Created
        );
        assert_eq!(
            repository.upsert(finding(Severity::Alta), march(), later),
            IssueUpsert::Refreshed
        );

        let issues = repository.list(&IssueFilter::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Alta);
        assert_eq!(issues[0].detected_at, first);
        assert_eq!(issues[0].last_seen_at, later);
    }

    #[test]
    fn test_resolved_issue_is_reopened_as_new() {
        let repository = IssueRepository::new();
        repository.upsert(finding(Severity::Media), march(), Utc::now());
        let original = repository.list(&IssueFilter::default())[0].clone();

        repository.resolve(original.id, Utc::now()).unwrap();
        assert_eq!(
            repository.upsert(finding(Severity::Media), march(), Utc::now()),
            IssueUpsert::Created
        );

        assert_eq!(repository.len(), 2);
        let open = repository.list(&IssueFilter {
            open_only: true,
            ..IssueFilter::default()
        });
        assert_eq!(open.len(), 1);
        assert_ne!(open[0].id, original.id);
    }

    #[test]
    fn test_different_period_is_a_different_issue() {
        let repository = IssueRepository::new();
        let april = PeriodWindow::month_of(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        repository.upsert(finding(Severity::Media), march(), Utc::now());
        repository.upsert(finding(Severity::Media), april, Utc::now());
        assert_eq!(repository.len(), 2);
    }

    #[test]
    fn test_resolve_errors() {
        let repository = IssueRepository::new();
        assert!(matches!(
            repository.resolve(Uuid::new_v4(), Utc::now()),
            Err(EngineError::IssueNotFound { .. })
        ));

        repository.upsert(finding(Severity::Baja), march(), Utc::now());
        let id = repository.list(&IssueFilter::default())[0].id;
        repository.resolve(id, Utc::now()).unwrap();
        assert!(matches!(
            repository.resolve(id, Utc::now()),
            Err(EngineError::IssueAlreadyResolved { .. })
        ));
    }

    #[test]
    fn test_list_filters_and_orders_by_severity() {
        let repository = IssueRepository::new();
        let now = Utc::now();
        repository.upsert(finding(Severity::Baja), march(), now);
        repository.upsert(
            Finding {
                kind: IssueKind::EmpleadoSinCentro,
                subject: "emp-2".to_string(),
                centre_code: None,
                ..finding(Severity::Critica)
            },
            march(),
            now,
        );

        let all = repository.list(&IssueFilter::default());
        assert_eq!(all[0].severity, Severity::Critica);

        let madrid = repository.list(&IssueFilter {
            centre_code: Some("MAD01".to_string()),
            ..IssueFilter::default()
        });
        assert_eq!(madrid.len(), 1);
        assert_eq!(madrid[0].kind, IssueKind::PlanSinReal);

        let unassigned = IssueFilter {
            kind: Some(IssueKind::EmpleadoSinCentro),
            ..IssueFilter::default()
        };
        assert_eq!(repository.open_count(&unassigned), 1);
    }
}
