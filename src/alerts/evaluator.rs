//! Alert threshold evaluation.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{AlertKind, AlertNotification, AlertRule, PeriodWindow};
use crate::quality::{IssueFilter, IssueRepository};
use crate::store::{FactSnapshot, MemoryStore};

use super::sink::NotificationSink;
use super::store::{AlertRuleRepository, NotificationRepository};

/// Share of a payroll amount that falls inside `window`, prorated by day.
fn prorate(amount: Decimal, period: &PeriodWindow, window: &PeriodWindow) -> Option<Decimal> {
    let overlap = period.overlap_days(window);
    let days = period.days();
    if overlap <= 0 || days <= 0 {
        return Some(Decimal::ZERO);
    }
    if overlap >= days {
        return Some(amount);
    }
    amount
        .checked_mul(Decimal::from(overlap))?
        .checked_div(Decimal::from(days))
}

fn checked_total(mut values: impl Iterator<Item = Option<Decimal>>) -> Option<Decimal> {
    values.try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value?))
}

fn worked_hours(facts: &FactSnapshot, window: &PeriodWindow) -> Option<Decimal> {
    checked_total(
        facts
            .payroll
            .iter()
            .map(|entry| prorate(entry.worked_hours, &entry.period, window)),
    )
}

fn labor_cost(facts: &FactSnapshot, window: &PeriodWindow) -> Option<Decimal> {
    checked_total(
        facts
            .payroll
            .iter()
            .map(|entry| prorate(entry.gross_cost, &entry.period, window)),
    )
}

fn planned_hours(facts: &FactSnapshot) -> Option<Decimal> {
    checked_total(facts.schedules.iter().map(|entry| Some(entry.planned_hours)))
}

/// Computes an aggregate metric over a snapshot.
///
/// Payroll amounts are prorated by the days their period shares with the
/// window. Ratios return `None` when their denominator is zero, and any
/// aggregate that overflows is `None` too; such rules do not fire.
pub fn compute_metric(
    kind: AlertKind,
    facts: &FactSnapshot,
    window: &PeriodWindow,
    open_issues: usize,
) -> Option<Decimal> {
    let value = match kind {
        AlertKind::LaborCost => labor_cost(facts, window)?,
        AlertKind::WorkedHours => worked_hours(facts, window)?,
        AlertKind::PlannedHours => planned_hours(facts)?,
        AlertKind::HoursDeviationPct => {
            let planned = planned_hours(facts)?;
            if planned.is_zero() {
                return None;
            }
            worked_hours(facts, window)?
                .checked_sub(planned)?
                .checked_mul(Decimal::ONE_HUNDRED)?
                .checked_div(planned)?
        }
        AlertKind::CostPerHour => {
            let hours = worked_hours(facts, window)?;
            if hours.is_zero() {
                return None;
            }
            labor_cost(facts, window)?.checked_div(hours)?
        }
        AlertKind::OpenIssues => Decimal::from(open_issues),
        AlertKind::AbsenceDays => Decimal::from(
            facts
                .absences
                .iter()
                .map(|entry| entry.days_within(window))
                .sum::<i64>(),
        ),
    };
    Some(value.round_dp(2))
}

/// Outcome of one evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    /// Active rules evaluated.
    pub evaluated: usize,
    /// Notifications created.
    pub fired: Vec<Uuid>,
    /// Rules whose metric was undefined for the period.
    pub undefined: Vec<Uuid>,
    /// Channel deliveries that failed.
    pub delivery_failures: usize,
}

/// Evaluates every active alert rule against the store.
pub struct AlertEvaluator {
    store: Arc<MemoryStore>,
    issues: Arc<IssueRepository>,
    rules: Arc<AlertRuleRepository>,
    notifications: Arc<NotificationRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl AlertEvaluator {
    /// Creates an evaluator.
    pub fn new(
        store: Arc<MemoryStore>,
        issues: Arc<IssueRepository>,
        rules: Arc<AlertRuleRepository>,
        notifications: Arc<NotificationRepository>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            issues,
            rules,
            notifications,
            sink,
        }
    }

    /// Computes the metric of `rule` for an evaluation on `as_of`.
    pub fn metric(&self, rule: &AlertRule, as_of: NaiveDate) -> (PeriodWindow, Option<Decimal>) {
        let window = rule.period.window(as_of);
        let centre = rule.centre_code.as_deref();
        let facts = self.store.snapshot(&window, centre);
        let open_issues = self.issues.open_count(&IssueFilter {
            centre_code: rule.centre_code.clone(),
            period: Some(window),
            ..IssueFilter::default()
        });
        (window, compute_metric(rule.kind, &facts, &window, open_issues))
    }

    /// Evaluates every active rule for `as_of`.
    ///
    /// Each satisfied rule creates one notification and hands it to the sink
    /// once per enabled channel. Nothing is remembered between runs.
    pub fn evaluate(&self, as_of: NaiveDate) -> EvaluationReport {
        self.evaluate_at(as_of, Utc::now())
    }

    /// Evaluates with an explicit clock.
    pub fn evaluate_at(&self, as_of: NaiveDate, now: DateTime<Utc>) -> EvaluationReport {
        let mut report = EvaluationReport::default();

        for rule in self.rules.active() {
            report.evaluated += 1;
            let (window, value) = self.metric(&rule, as_of);
            let Some(value) = value else {
                debug!(rule_id = %rule.id, kind = ?rule.kind, "Metric undefined for period");
                report.undefined.push(rule.id);
                continue;
            };
            if !rule.operator.is_satisfied(value, rule.threshold) {
                continue;
            }

            let notification = AlertNotification {
                id: Uuid::new_v4(),
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                kind: rule.kind,
                centre_code: rule.centre_code.clone(),
                period: window,
                value,
                threshold: rule.threshold,
                operator: rule.operator,
                channels: rule.channels.clone(),
                message: format!(
                    "{}: {} {} {} {} ({} to {}, {})",
                    rule.name,
                    rule.kind.label(),
                    value,
                    rule.operator,
                    rule.threshold,
                    window.start,
                    window.end,
                    rule.centre_code.as_deref().unwrap_or("all centres"),
                ),
                created_at: now,
                read: false,
            };
            for channel in &rule.channels {
                if let Err(e) = self.sink.deliver(*channel, &notification) {
                    warn!(rule_id = %rule.id, error = %e, "Notification delivery failed");
                    report.delivery_failures += 1;
                }
            }
            report.fired.push(notification.id);
            self.notifications.push(notification);
        }

        info!(
            as_of = %as_of,
            evaluated = report.evaluated,
            fired = report.fired.len(),
            delivery_failures = report.delivery_failures,
            "Alert evaluation finished"
        );
        report
    }
}
