//! Rule-based data quality checks over the reconciled store.
//!
//! [`QualityEngine::recalculate`] evaluates every [`QualityRule`] for a
//! period and optional centre. Findings open or refresh issues in the
//! [`IssueRepository`], keyed by kind, subject, centre and period, so
//! repeated recalculations never duplicate an open issue. Issues are only
//! closed by an explicit resolve.

mod engine;
mod issues;
mod rules;

pub use engine::{QualityEngine, QualityReport, RuleFailure};
pub use issues::{IssueFilter, IssueRepository, IssueUpsert};
pub use rules::{
    CostOutlier, EmployeeWithoutCentre, Finding, PayrollWithoutPlan, PlannedWithoutPayroll,
    QualityRule, RuleContext, RuleError, default_rules,
};
