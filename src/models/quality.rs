//! Data quality issue model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PeriodWindow;
use crate::error::{EngineError, EngineResult};

/// The anomaly classes detected by the data quality rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    /// Planned hours with no payroll coverage.
    #[serde(rename = "PLAN_SIN_REAL")]
    PlanSinReal,
    /// Payroll hours with no planned schedule.
    #[serde(rename = "REAL_SIN_PLAN")]
    RealSinPlan,
    /// Cost per hour outside the centre's expected band.
    #[serde(rename = "COSTE_ATIPICO")]
    CosteAtipico,
    /// Active employee without a home centre.
    #[serde(rename = "EMPLEADO_SIN_CENTRO")]
    EmpleadoSinCentro,
}

impl IssueKind {
    /// Returns the wire code of the kind.
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::PlanSinReal => "PLAN_SIN_REAL",
            IssueKind::RealSinPlan => "REAL_SIN_PLAN",
            IssueKind::CosteAtipico => "COSTE_ATIPICO",
            IssueKind::EmpleadoSinCentro => "EMPLEADO_SIN_CENTRO",
        }
    }

    /// Returns a human-readable label for exports.
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::PlanSinReal => "Planned hours without payroll",
            IssueKind::RealSinPlan => "Payroll hours without schedule",
            IssueKind::CosteAtipico => "Atypical cost per hour",
            IssueKind::EmpleadoSinCentro => "Employee without centre",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Issue urgency, declared from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Needs immediate attention.
    Critica,
    /// High.
    Alta,
    /// Medium.
    Media,
    /// Low.
    Baja,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Critica => "critica",
            Severity::Alta => "alta",
            Severity::Media => "media",
            Severity::Baja => "baja",
        };
        f.write_str(name)
    }
}

/// The identity of an anomaly: at most one open issue exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueKey {
    /// Anomaly class.
    pub kind: IssueKind,
    /// The affected employee ID or centre code.
    pub subject: String,
    /// Centre scope of the issue.
    pub centre_code: Option<String>,
    /// The evaluated period.
    pub period: PeriodWindow,
}

/// An anomaly materialized by the data quality rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityIssue {
    /// Issue identifier.
    pub id: Uuid,
    /// Anomaly class.
    pub kind: IssueKind,
    /// Urgency.
    pub severity: Severity,
    /// The affected employee ID or centre code.
    pub subject: String,
    /// The affected employee, when the issue is employee-scoped.
    #[serde(default)]
    pub employee_id: Option<Uuid>,
    /// Centre scope.
    #[serde(default)]
    pub centre_code: Option<String>,
    /// Evaluated period.
    pub period: PeriodWindow,
    /// Rule-specific structured detail.
    pub detail: serde_json::Value,
    /// When the anomaly was first detected.
    pub detected_at: DateTime<Utc>,
    /// When the anomaly was last seen by a recalculation.
    pub last_seen_at: DateTime<Utc>,
    /// Whether a user resolved the issue.
    pub resolved: bool,
    /// When the issue was resolved.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DataQualityIssue {
    /// Returns the deduplication key of the issue.
    pub fn key(&self) -> IssueKey {
        IssueKey {
            kind: self.kind,
            subject: self.subject.clone(),
            centre_code: self.centre_code.clone(),
            period: self.period,
        }
    }

    /// Returns true while the issue is unresolved.
    pub fn is_open(&self) -> bool {
        !self.resolved
    }

    /// Marks the issue resolved.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> EngineResult<()> {
        if self.resolved {
            return Err(EngineError::IssueAlreadyResolved { issue_id: self.id });
        }
        self.resolved = true;
        self.resolved_at = Some(at);
        Ok(())
    }
}
