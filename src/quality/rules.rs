//! Data quality rules.
//!
//! Each rule inspects the facts of one period and returns findings. Rules
//! are pure: they neither read the issue log nor write to the store. The
//! engine turns findings into issues.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::config::QualityConfig;
use crate::models::{IssueKind, PeriodWindow, Severity};
use crate::store::FactSnapshot;

/// What a rule sees.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Evaluated period.
    pub window: PeriodWindow,
    /// Centre scope, if any.
    pub centre_code: Option<&'a str>,
    /// Facts of the period.
    pub facts: &'a FactSnapshot,
    /// Thresholds.
    pub config: &'a QualityConfig,
}

/// One detected anomaly.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// Anomaly class.
    pub kind: IssueKind,
    /// Urgency.
    pub severity: Severity,
    /// Affected employee ID or centre code.
    pub subject: String,
    /// Affected employee.
    pub employee_id: Option<Uuid>,
    /// Centre the anomaly belongs to.
    pub centre_code: Option<String>,
    /// Rule-specific detail.
    pub detail: serde_json::Value,
}

/// A rule could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A computation left the decimal range.
    #[error("Arithmetic overflow while computing {what}")]
    Overflow {
        /// The computed quantity.
        what: String,
    },
}

/// A data quality check.
pub trait QualityRule: Send + Sync {
    /// The issue kind the rule produces.
    fn kind(&self) -> IssueKind;

    /// Evaluates the rule.
    fn evaluate(&self, context: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError>;
}

/// Returns the four built-in rules in evaluation order.
pub fn default_rules() -> Vec<Box<dyn QualityRule>> {
    vec![
        Box::new(PlannedWithoutPayroll),
        Box::new(PayrollWithoutPlan),
        Box::new(CostOutlier),
        Box::new(EmployeeWithoutCentre),
    ]
}

fn checked_sum<I: IntoIterator<Item = Decimal>>(values: I, what: &str) -> Result<Decimal, RuleError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, value| total.checked_add(value))
        .ok_or_else(|| RuleError::Overflow {
            what: what.to_string(),
        })
}

type EmployeeCentre = (Uuid, Option<String>);

fn planned_by_employee(facts: &FactSnapshot) -> Result<BTreeMap<EmployeeCentre, Decimal>, RuleError> {
    let mut grouped: BTreeMap<EmployeeCentre, Vec<Decimal>> = BTreeMap::new();
    for entry in &facts.schedules {
        grouped
            .entry((entry.employee_id, entry.centre_code.clone()))
            .or_default()
            .push(entry.planned_hours);
    }
    grouped
        .into_iter()
        .map(|(key, hours)| Ok((key, checked_sum(hours, "planned hours")?)))
        .collect()
}

fn worked_by_employee(facts: &FactSnapshot) -> Result<BTreeMap<EmployeeCentre, Decimal>, RuleError> {
    let mut grouped: BTreeMap<EmployeeCentre, Vec<Decimal>> = BTreeMap::new();
    for entry in &facts.payroll {
        grouped
            .entry((entry.employee_id, entry.centre_code.clone()))
            .or_default()
            .push(entry.worked_hours);
    }
    grouped
        .into_iter()
        .map(|(key, hours)| Ok((key, checked_sum(hours, "worked hours")?)))
        .collect()
}

/// Folds per-centre totals into one total per employee.
fn per_employee(
    totals: &BTreeMap<EmployeeCentre, Decimal>,
    what: &str,
) -> Result<BTreeMap<Uuid, Decimal>, RuleError> {
    let mut grouped: BTreeMap<Uuid, Vec<Decimal>> = BTreeMap::new();
    for ((employee_id, _), hours) in totals {
        grouped.entry(*employee_id).or_default().push(*hours);
    }
    grouped
        .into_iter()
        .map(|(employee_id, hours)| Ok((employee_id, checked_sum(hours, what)?)))
        .collect()
}

fn has_no_hours(employee_id: &Uuid, totals: &BTreeMap<Uuid, Decimal>) -> bool {
    totals
        .get(employee_id)
        .is_none_or(|hours| *hours <= Decimal::ZERO)
}

/// `PLAN_SIN_REAL`: planned hours with no hours in payroll.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlannedWithoutPayroll;

impl QualityRule for PlannedWithoutPayroll {
    fn kind(&self) -> IssueKind {
        IssueKind::PlanSinReal
    }

    fn evaluate(&self, context: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let planned = planned_by_employee(context.facts)?;
        let worked = per_employee(&worked_by_employee(context.facts)?, "worked hours")?;

        Ok(planned
            .into_iter()
            .filter(|(_, hours)| *hours > Decimal::ZERO)
            .filter(|((employee_id, _), _)| has_no_hours(employee_id, &worked))
            .map(|((employee_id, centre_code), hours)| Finding {
                kind: IssueKind::PlanSinReal,
                severity: context.config.hours_gap.classify(hours),
                subject: employee_id.to_string(),
                employee_id: Some(employee_id),
                centre_code,
                detail: json!({
                    "planned_hours": hours,
                    "worked_hours": Decimal::ZERO,
                    "gap_hours": hours,
                }),
            })
            .collect())
    }
}

/// `REAL_SIN_PLAN`: payroll hours with nothing planned.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayrollWithoutPlan;

impl QualityRule for PayrollWithoutPlan {
    fn kind(&self) -> IssueKind {
        IssueKind::RealSinPlan
    }

    fn evaluate(&self, context: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let planned = per_employee(&planned_by_employee(context.facts)?, "planned hours")?;
        let worked = worked_by_employee(context.facts)?;

        Ok(worked
            .into_iter()
            .filter(|(_, hours)| *hours > Decimal::ZERO)
            .filter(|((employee_id, _), _)| has_no_hours(employee_id, &planned))
            .map(|((employee_id, centre_code), hours)| Finding {
                kind: IssueKind::RealSinPlan,
                severity: context.config.hours_gap.classify(hours),
                subject: employee_id.to_string(),
                employee_id: Some(employee_id),
                centre_code,
                detail: json!({
                    "planned_hours": Decimal::ZERO,
                    "worked_hours": hours,
                    "gap_hours": hours,
                }),
            })
            .collect())
    }
}

/// Quartile of sorted values with linear interpolation.
fn quartile(sorted: &[Decimal], q: Decimal) -> Option<Decimal> {
    let last = sorted.len().checked_sub(1)?;
    let position = q.checked_mul(Decimal::from(last))?;
    let lower = position.floor();
    let index = lower.to_usize()?;
    let fraction = position - lower;
    let low = *sorted.get(index)?;
    let high = *sorted.get(index + 1).unwrap_or(&low);
    low.checked_add((high - low).checked_mul(fraction)?)
}

/// `COSTE_ATIPICO`: cost per hour outside the Tukey fences of its centre.
///
/// Centres with fewer than `min_sample` payroll entries are not evaluated.
/// Severity is the distance beyond the fence in interquartile ranges; with
/// a zero range the distance is relative to the median.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostOutlier;

impl QualityRule for CostOutlier {
    fn kind(&self) -> IssueKind {
        IssueKind::CosteAtipico
    }

    fn evaluate(&self, context: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let outlier = &context.config.outlier;
        let overflow = |what: &str| RuleError::Overflow {
            what: what.to_string(),
        };

        let mut by_centre: BTreeMap<Option<String>, Vec<(Uuid, Decimal)>> = BTreeMap::new();
        for entry in &context.facts.payroll {
            if let Some(rate) = entry.cost_per_hour() {
                by_centre
                    .entry(entry.centre_code.clone())
                    .or_default()
                    .push((entry.employee_id, rate.round_dp(4)));
            }
        }

        let mut findings = Vec::new();
        for (centre_code, samples) in by_centre {
            if samples.len() < outlier.min_sample {
                continue;
            }
            let mut rates: Vec<Decimal> = samples.iter().map(|(_, rate)| *rate).collect();
            rates.sort();

            let q1 = quartile(&rates, Decimal::new(25, 2)).ok_or_else(|| overflow("first quartile"))?;
            let median = quartile(&rates, Decimal::new(5, 1)).ok_or_else(|| overflow("median"))?;
            let q3 = quartile(&rates, Decimal::new(75, 2)).ok_or_else(|| overflow("third quartile"))?;
            let iqr = q3 - q1;
            let reach = outlier
                .fence_multiplier
                .checked_mul(iqr)
                .ok_or_else(|| overflow("fence"))?;
            let lower = q1 - reach;
            let upper = q3 + reach;

            for (employee_id, rate) in samples {
                let beyond = if rate > upper {
                    rate - upper
                } else if rate < lower {
                    lower - rate
                } else {
                    continue;
                };
                let unit = if iqr > Decimal::ZERO { iqr } else { median.abs() };
                let distance = if unit > Decimal::ZERO {
                    beyond.checked_div(unit).ok_or_else(|| overflow("fence distance"))?
                } else {
                    Decimal::MAX
                };

                findings.push(Finding {
                    kind: IssueKind::CosteAtipico,
                    severity: outlier.severity.classify(distance),
                    subject: employee_id.to_string(),
                    employee_id: Some(employee_id),
                    centre_code: centre_code.clone(),
                    detail: json!({
                        "cost_per_hour": rate,
                        "q1": q1,
                        "median": median,
                        "q3": q3,
                        "lower_fence": lower,
                        "upper_fence": upper,
                        "sample_size": rates.len(),
                    }),
                });
            }
        }
        Ok(findings)
    }
}

/// `EMPLEADO_SIN_CENTRO`: an employee active in the period with no centre.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmployeeWithoutCentre;

impl QualityRule for EmployeeWithoutCentre {
    fn kind(&self) -> IssueKind {
        IssueKind::EmpleadoSinCentro
    }

    fn evaluate(&self, context: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(context
            .facts
            .employees
            .iter()
            .filter(|employee| employee.centre_code.is_none())
            .filter(|employee| employee.is_active_during(context.window.start, context.window.end))
            .map(|employee| Finding {
                kind: IssueKind::EmpleadoSinCentro,
                severity: context.config.unassigned_severity,
                subject: employee.id.to_string(),
                employee_id: Some(employee.id),
                centre_code: None,
                detail: json!({
                    "display_name": employee.display_name,
                    "scheduling_id": employee.scheduling_id,
                    "payroll_code": employee.payroll_code,
                }),
            })
            .collect())
    }
}
