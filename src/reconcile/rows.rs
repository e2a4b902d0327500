//! Typed rows accepted by the batch reconciler.
//!
//! Every row exposes a natural key through [`Keyed`]; the key identifies the
//! row in reports and decides whether a write is an insert or an update.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{PeriodWindow, Provenance};

/// A row with a natural key.
pub trait Keyed {
    /// Returns the key identifying the row within its table.
    fn natural_key(&self) -> String;
}

/// How a fact row points at its employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum EmployeeRef {
    /// Internal employee ID.
    Internal(Uuid),
    /// External scheduling ID.
    SchedulingId(String),
    /// External payroll code.
    PayrollCode(String),
}

impl fmt::Display for EmployeeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmployeeRef::Internal(id) => write!(f, "internal:{id}"),
            EmployeeRef::SchedulingId(id) => write!(f, "scheduling:{id}"),
            EmployeeRef::PayrollCode(code) => write!(f, "payroll:{code}"),
        }
    }
}

/// An employee as reported by an external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRow {
    /// External scheduling ID.
    pub scheduling_id: Option<String>,
    /// External payroll code.
    pub payroll_code: Option<String>,
    /// Display name.
    pub display_name: String,
    /// Home centre.
    pub centre_code: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// First day of employment.
    pub active_from: Option<NaiveDate>,
    /// Last day of employment.
    pub active_to: Option<NaiveDate>,
}

impl Keyed for EmployeeRow {
    fn natural_key(&self) -> String {
        match (&self.scheduling_id, &self.payroll_code) {
            (Some(id), _) => format!("scheduling:{id}"),
            (None, Some(code)) => format!("payroll:{code}"),
            (None, None) => format!("unbound:{}", self.display_name),
        }
    }
}

/// A centre from a restaurant file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentreRow {
    /// Internal centre code.
    pub code: String,
    /// Centre name.
    pub name: String,
    /// Site ID in the scheduling system.
    pub scheduling_site_id: Option<String>,
    /// Site code in the payroll system.
    pub payroll_site_code: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Opening date.
    pub opened_on: Option<NaiveDate>,
}

impl Keyed for CentreRow {
    fn natural_key(&self) -> String {
        format!("centre:{}", self.code)
    }
}

/// A planned shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// Entry ID in the scheduling system.
    pub external_id: String,
    /// The scheduled employee.
    pub employee: EmployeeRef,
    /// Centre the shift is planned at.
    pub centre_code: Option<String>,
    /// Day of the shift.
    pub date: NaiveDate,
    /// Planned hours.
    pub planned_hours: Decimal,
    /// Source of the row.
    pub provenance: Provenance,
}

impl Keyed for ScheduleRow {
    fn natural_key(&self) -> String {
        format!("schedule:{}", self.external_id)
    }
}

/// An absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceRow {
    /// Absence ID in the scheduling system.
    pub external_id: String,
    /// The absent employee.
    pub employee: EmployeeRef,
    /// Absence type.
    pub kind: String,
    /// First day.
    pub start_date: NaiveDate,
    /// Last day.
    pub end_date: NaiveDate,
    /// Source of the row.
    pub provenance: Provenance,
}

impl Keyed for AbsenceRow {
    fn natural_key(&self) -> String {
        format!("absence:{}", self.external_id)
    }
}

/// Hours and cost of one employee for one payroll period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRow {
    /// External payroll code.
    pub payroll_code: String,
    /// Name used if the payroll code is not yet known.
    pub employee_name: Option<String>,
    /// Centre the cost is booked against.
    pub centre_code: Option<String>,
    /// The payroll period.
    pub period: PeriodWindow,
    /// Worked hours.
    pub worked_hours: Decimal,
    /// Gross cost.
    pub gross_cost: Decimal,
    /// Source of the row.
    pub provenance: Provenance,
}

impl Keyed for PayrollRow {
    fn natural_key(&self) -> String {
        format!(
            "payroll:{}:{}:{}",
            self.payroll_code, self.period.start, self.period.end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(scheduling_id: Option<&str>, payroll_code: Option<&str>) -> EmployeeRow {
        EmployeeRow {
            scheduling_id: scheduling_id.map(str::to_string),
            payroll_code: payroll_code.map(str::to_string),
            display_name: "Eva".to_string(),
            centre_code: None,
            email: None,
            active_from: None,
            active_to: None,
        }
    }

    #[test]
    fn test_employee_key_prefers_scheduling_id() {
        assert_eq!(
            employee(Some("S-1"), Some("P-1")).natural_key(),
            "scheduling:S-1"
        );
        assert_eq!(employee(None, Some("P-1")).natural_key(), "payroll:P-1");
        assert_eq!(employee(None, None).natural_key(), "unbound:Eva");
    }

    #[test]
    fn test_payroll_key_includes_period() {
        let row = PayrollRow {
            payroll_code: "N-7".to_string(),
            employee_name: None,
            centre_code: None,
            period: PeriodWindow::month_of(NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()),
            worked_hours: Decimal::ZERO,
            gross_cost: Decimal::ZERO,
            provenance: Provenance::Manual,
        };
        assert_eq!(row.natural_key(), "payroll:N-7:2025-02-01:2025-02-28");
    }

    #[test]
    fn test_employee_ref_serialization() {
        let reference = EmployeeRef::SchedulingId("S-9".to_string());
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, r#"{"by":"scheduling_id","value":"S-9"}"#);
        assert_eq!(reference.to_string(), "scheduling:S-9");
    }
}
