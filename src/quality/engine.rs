//! Runs the data quality rules and maintains the issue log.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::QualityConfig;
use crate::models::{IssueKind, PeriodWindow};
use crate::store::MemoryStore;

use super::issues::{IssueRepository, IssueUpsert};
use super::rules::{QualityRule, RuleContext, default_rules};

/// A rule that could not be evaluated during a recalculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    /// The failing rule.
    pub kind: IssueKind,
    /// What went wrong.
    pub message: String,
}

/// Outcome of one recalculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    /// Evaluated period.
    pub period: PeriodWindow,
    /// Centre scope.
    pub centre_code: Option<String>,
    /// Findings produced by the rules.
    pub findings: usize,
    /// Issues opened.
    pub created: usize,
    /// Open issues refreshed.
    pub refreshed: usize,
    /// Rules that were skipped.
    pub rule_errors: Vec<RuleFailure>,
}

/// Evaluates the quality rules against the store.
pub struct QualityEngine {
    store: Arc<MemoryStore>,
    issues: Arc<IssueRepository>,
    config: QualityConfig,
    rules: Vec<Box<dyn QualityRule>>,
}

impl QualityEngine {
    /// Creates an engine with the built-in rules.
    pub fn new(store: Arc<MemoryStore>, issues: Arc<IssueRepository>, config: QualityConfig) -> Self {
        Self::with_rules(store, issues, config, default_rules())
    }

    /// Creates an engine with an explicit rule set.
    pub fn with_rules(
        store: Arc<MemoryStore>,
        issues: Arc<IssueRepository>,
        config: QualityConfig,
        rules: Vec<Box<dyn QualityRule>>,
    ) -> Self {
        Self {
            store,
            issues,
            config,
            rules,
        }
    }

    /// The issue log the engine writes to.
    pub fn issues(&self) -> &Arc<IssueRepository> {
        &self.issues
    }

    /// Recalculates issues for `period`, optionally scoped to one centre.
    pub fn recalculate(&self, period: PeriodWindow, centre_code: Option<&str>) -> QualityReport {
        self.recalculate_at(period, centre_code, Utc::now())
    }

    /// Recalculates with an explicit clock.
    ///
    /// Running twice over unchanged facts refreshes the same open issues and
    /// creates none. A failing rule is logged and skipped.
    pub fn recalculate_at(
        &self,
        period: PeriodWindow,
        centre_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> QualityReport {
        let facts = self.store.snapshot(&period, centre_code);
        let context = RuleContext {
            window: period,
            centre_code,
            facts: &facts,
            config: &self.config,
        };

        let mut report = QualityReport {
            period,
            centre_code: centre_code.map(str::to_string),
            findings: 0,
            created: 0,
            refreshed: 0,
            rule_errors: Vec::new(),
        };

        for rule in &self.rules {
            let findings = match rule.evaluate(&context) {
                Ok(findings) => findings,
                Err(e) => {
                    warn!(rule = %rule.kind(), error = %e, "Quality rule skipped");
                    report.rule_errors.push(RuleFailure {
                        kind: rule.kind(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            debug!(rule = %rule.kind(), findings = findings.len(), "Quality rule evaluated");

            report.findings += findings.len();
            for finding in findings {
                match self.issues.upsert(finding, period, now) {
                    IssueUpsert::Created => report.created += 1,
                    IssueUpsert::Refreshed => report.refreshed += 1,
                }
            }
        }

        info!(
            start = %period.start,
            end = %period.end,
            centre = centre_code.unwrap_or("*"),
            created = report.created,
            refreshed = report.refreshed,
            rule_errors = report.rule_errors.len(),
            "Quality recalculation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmployeeRecord, Provenance, Severity, WriteStrategy};
    use crate::quality::{Finding, IssueFilter, RuleError};
    use crate::reconcile::{BatchReconciler, EmployeeRef, ScheduleRow};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn march() -> PeriodWindow {
        PeriodWindow::month_of(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
    }

    fn store_with_unpaid_shift() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut employee = EmployeeRecord::new("Lucía Gómez");
        employee.scheduling_id = Some("S-1".to_string());
        employee.centre_code = Some("MAD01".to_string());
        store.identities().insert(employee).unwrap();

        let row = ScheduleRow {
            external_id: "sh-1".to_string(),
            employee: EmployeeRef::SchedulingId("S-1".to_string()),
            centre_code: Some("MAD01".to_string()),
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            planned_hours: Decimal::new(8, 0),
            provenance: Provenance::Synchronized,
        };
        let report = BatchReconciler::default().reconcile(store.as_ref(), &[row], WriteStrategy::Upsert);
        assert_eq!(report.inserted, 1);
        store
    }

    #[test]
    fn test_unpaid_shift_opens_one_issue() {
        let store = store_with_unpaid_shift();
        let engine = QualityEngine::new(store, Arc::new(IssueRepository::new()), QualityConfig::default());

        let report = engine.recalculate(march(), Some("MAD01"));

        assert_eq!(report.created, 1);
        let issues = engine.issues().list(&IssueFilter::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::PlanSinReal);
        assert_eq!(issues[0].severity, Severity::Media);
    }

    #[test]
    fn test_recalculation_is_idempotent() {
        let store = store_with_unpaid_shift();
        let engine = QualityEngine::new(store, Arc::new(IssueRepository::new()), QualityConfig::default());

        let first = engine.recalculate(march(), None);
        let second = engine.recalculate(march(), None);

        assert_eq!(first.created, second.refreshed);
        assert_eq!(second.created, 0);
        let open = engine.issues().list(&IssueFilter {
            open_only: true,
            ..IssueFilter::default()
        });
        assert_eq!(open.len(), first.created);
    }

    struct Broken;

    impl QualityRule for Broken {
        fn kind(&self) -> IssueKind {
            IssueKind::CosteAtipico
        }

        fn evaluate(&self, _: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
            Err(RuleError::Overflow {
                what: "cost per hour".to_string(),
            })
        }
    }

    #[test]
    fn test_failing_rule_is_reported_and_skipped() {
        let store = store_with_unpaid_shift();
        let mut rules = default_rules();
        rules.insert(0, Box::new(Broken));
        let engine = QualityEngine::with_rules(
            store,
            Arc::new(IssueRepository::new()),
            QualityConfig::default(),
            rules,
        );

        let report = engine.recalculate(march(), None);

        assert_eq!(report.rule_errors.len(), 1);
        assert_eq!(report.rule_errors[0].kind, IssueKind::CosteAtipico);
        assert_eq!(report.created, 1);
    }
}
