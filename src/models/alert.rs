//! Alert rules and notifications.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PeriodWindow;

/// The aggregate metric an alert rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Sum of gross payroll cost.
    LaborCost,
    /// Sum of payroll-recorded worked hours.
    WorkedHours,
    /// Sum of planned schedule hours.
    PlannedHours,
    /// (worked - planned) / planned, as a percentage.
    HoursDeviationPct,
    /// Gross cost divided by worked hours.
    CostPerHour,
    /// Number of open data quality issues.
    OpenIssues,
    /// Number of absence days.
    AbsenceDays,
}

impl AlertKind {
    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::LaborCost => "Labour cost",
            AlertKind::WorkedHours => "Worked hours",
            AlertKind::PlannedHours => "Planned hours",
            AlertKind::HoursDeviationPct => "Hours deviation (%)",
            AlertKind::CostPerHour => "Cost per hour",
            AlertKind::OpenIssues => "Open data quality issues",
            AlertKind::AbsenceDays => "Absence days",
        }
    }
}

/// Comparison applied between the metric and the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// Metric strictly greater than threshold.
    #[serde(rename = ">")]
    GreaterThan,
    /// Metric strictly less than threshold.
    #[serde(rename = "<")]
    LessThan,
    /// Metric equal to threshold.
    #[serde(rename = "=")]
    Equal,
}

impl ComparisonOperator {
    /// Returns true if `value <op> threshold` holds.
    ///
    /// # Examples
    ///
    /// ```
    /// use workforce_sync::models::ComparisonOperator;
    /// use rust_decimal::Decimal;
    ///
    /// let op = ComparisonOperator::GreaterThan;
    /// assert!(op.is_satisfied(Decimal::new(11, 0), Decimal::new(10, 0)));
    /// assert!(!op.is_satisfied(Decimal::new(10, 0), Decimal::new(10, 0)));
    /// ```
    pub fn is_satisfied(&self, value: Decimal, threshold: Decimal) -> bool {
        match self {
            ComparisonOperator::GreaterThan => value > threshold,
            ComparisonOperator::LessThan => value < threshold,
            ComparisonOperator::Equal => value == threshold,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::Equal => "=",
        };
        f.write_str(symbol)
    }
}

/// The calendar period a rule aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPeriod {
    /// The evaluation day.
    Day,
    /// The Monday-to-Sunday week containing the evaluation day.
    Week,
    /// The calendar month containing the evaluation day.
    Month,
}

impl EvaluationPeriod {
    /// Returns the window this period covers for an evaluation on `as_of`.
    pub fn window(&self, as_of: NaiveDate) -> PeriodWindow {
        match self {
            EvaluationPeriod::Day => PeriodWindow {
                start: as_of,
                end: as_of,
            },
            EvaluationPeriod::Week => PeriodWindow::week_of(as_of),
            EvaluationPeriod::Month => PeriodWindow::month_of(as_of),
        }
    }
}

/// A delivery channel for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// The back office notification tray.
    InApp,
    /// Email.
    Email,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::InApp => f.write_str("in_app"),
            Channel::Email => f.write_str("email"),
        }
    }
}

/// A user-authored threshold rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// The watched metric.
    pub kind: AlertKind,
    /// Centre scope; `None` aggregates over every centre.
    #[serde(default)]
    pub centre_code: Option<String>,
    /// The threshold the metric is compared to.
    pub threshold: Decimal,
    /// How metric and threshold are compared.
    pub operator: ComparisonOperator,
    /// The aggregation period.
    pub period: EvaluationPeriod,
    /// Channels a firing is delivered to.
    pub channels: Vec<Channel>,
    /// Inactive rules are never evaluated.
    pub active: bool,
}

/// The record of one rule firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotification {
    /// Notification identifier.
    pub id: Uuid,
    /// The rule that fired.
    pub rule_id: Uuid,
    /// Rule name at firing time.
    pub rule_name: String,
    /// The watched metric.
    pub kind: AlertKind,
    /// Centre scope of the rule.
    pub centre_code: Option<String>,
    /// The evaluated window.
    pub period: PeriodWindow,
    /// The computed metric value.
    pub value: Decimal,
    /// The rule threshold.
    pub threshold: Decimal,
    /// The rule operator.
    pub operator: ComparisonOperator,
    /// Channels the notification was fanned out to.
    pub channels: Vec<Channel>,
    /// Human-readable summary.
    pub message: String,
    /// When the rule fired.
    pub created_at: DateTime<Utc>,
    /// Whether a user has read the notification.
    pub read: bool,
}
