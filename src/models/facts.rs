//! Time-scoped facts attached to an employee.
//!
//! Schedule entries, absences and payroll periods all reference an
//! [`EmployeeRecord`](super::EmployeeRecord) by internal ID and carry a
//! [`Provenance`] flag recording whether they were entered by hand or
//! pulled from an external system.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PeriodWindow;

/// Where a fact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Entered or imported by a back office user.
    Manual,
    /// Pulled from an external system by a sync job.
    Synchronized,
}

/// A planned shift for an employee on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Internal ID of the scheduled employee.
    pub employee_id: Uuid,
    /// Identifier of the entry in the scheduling system.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Centre the shift is planned at.
    #[serde(default)]
    pub centre_code: Option<String>,
    /// Day of the shift.
    pub date: NaiveDate,
    /// Planned hours for the shift.
    pub planned_hours: Decimal,
    /// Where the entry came from.
    pub provenance: Provenance,
}

/// A leave or absence covering an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceEntry {
    /// Internal ID of the absent employee.
    pub employee_id: Uuid,
    /// Identifier of the absence in the scheduling system.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Absence type as reported by the source (e.g. "vacaciones").
    pub kind: String,
    /// First day of the absence.
    pub start_date: NaiveDate,
    /// Last day of the absence.
    pub end_date: NaiveDate,
    /// Where the entry came from.
    pub provenance: Provenance,
}

impl AbsenceEntry {
    /// Returns the number of absence days falling inside `window`.
    pub fn days_within(&self, window: &PeriodWindow) -> i64 {
        let span = PeriodWindow {
            start: self.start_date,
            end: self.end_date.max(self.start_date),
        };
        span.overlap_days(window)
    }
}

/// Hours and cost recorded by the payroll system for one employee and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollPeriod {
    /// Internal ID of the paid employee.
    pub employee_id: Uuid,
    /// Centre the cost is booked against.
    #[serde(default)]
    pub centre_code: Option<String>,
    /// The payroll period.
    pub period: PeriodWindow,
    /// Hours actually worked in the period.
    pub worked_hours: Decimal,
    /// Gross labour cost for the period.
    pub gross_cost: Decimal,
    /// Where the entry came from.
    pub provenance: Provenance,
}

impl PayrollPeriod {
    /// Returns the cost per worked hour, or `None` when no hours were worked.
    ///
    /// # Examples
    ///
    /// ```
    /// use workforce_sync::models::{PayrollPeriod, PeriodWindow, Provenance};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    /// use uuid::Uuid;
    ///
    /// let period = PayrollPeriod {
    ///     employee_id: Uuid::new_v4(),
    ///     centre_code: Some("MAD01".to_string()),
    ///     period: PeriodWindow::month_of(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()),
    ///     worked_hours: Decimal::new(160, 0),
    ///     gross_cost: Decimal::new(2400, 0),
    ///     provenance: Provenance::Manual,
    /// };
    /// assert_eq!(period.cost_per_hour(), Some(Decimal::new(15, 0)));
    /// ```
    pub fn cost_per_hour(&self) -> Option<Decimal> {
        if self.worked_hours <= Decimal::ZERO {
            return None;
        }
        self.gross_cost.checked_div(self.worked_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_absence_days_within_window() {
        let absence = AbsenceEntry {
            employee_id: Uuid::new_v4(),
            external_id: Some("ABS-1".to_string()),
            kind: "vacaciones".to_string(),
            start_date: date(2025, 3, 28),
            end_date: date(2025, 4, 4),
            provenance: Provenance::Synchronized,
        };
        let march = PeriodWindow::month_of(date(2025, 3, 1));
        assert_eq!(absence.days_within(&march), 4);
    }

    #[test]
    fn test_cost_per_hour_without_hours() {
        let period = PayrollPeriod {
            employee_id: Uuid::new_v4(),
            centre_code: None,
            period: PeriodWindow::month_of(date(2025, 3, 1)),
            worked_hours: Decimal::ZERO,
            gross_cost: Decimal::new(100, 0),
            provenance: Provenance::Manual,
        };
        assert_eq!(period.cost_per_hour(), None);
    }

    #[test]
    fn test_provenance_serialization() {
        assert_eq!(
            serde_json::to_string(&Provenance::Synchronized).unwrap(),
            "\"synchronized\""
        );
        assert_eq!(
            serde_json::to_string(&Provenance::Manual).unwrap(),
            "\"manual\""
        );
    }
}
