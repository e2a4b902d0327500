//! Employee identity model.
//!
//! This module defines the [`EmployeeRecord`], the aggregate root that binds
//! an internal employee ID to the identifiers used by the external scheduling
//! and payroll systems.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The internal identity of an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    /// Internal identifier, generated once and never reassigned.
    pub id: Uuid,
    /// The name shown in back office screens.
    pub display_name: String,
    /// The employee's home centre, if assigned.
    #[serde(default)]
    pub centre_code: Option<String>,
    /// Identifier in the external scheduling system (unique when present).
    #[serde(default)]
    pub scheduling_id: Option<String>,
    /// Identifier in the external payroll system (unique when present).
    #[serde(default)]
    pub payroll_code: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// First day of employment, if known.
    #[serde(default)]
    pub active_from: Option<NaiveDate>,
    /// Last day of employment, if the employee has left.
    #[serde(default)]
    pub active_to: Option<NaiveDate>,
}

impl EmployeeRecord {
    /// Creates an unbound record with a freshly generated internal ID.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            centre_code: None,
            scheduling_id: None,
            payroll_code: None,
            email: None,
            active_from: None,
            active_to: None,
        }
    }

    /// Returns true if the employee is employed on `date`.
    ///
    /// Missing bounds are treated as open-ended.
    ///
    /// # Examples
    ///
    /// ```
    /// use workforce_sync::models::EmployeeRecord;
    /// use chrono::NaiveDate;
    ///
    /// let mut employee = EmployeeRecord::new("Ana Ruiz");
    /// employee.active_to = NaiveDate::from_ymd_opt(2025, 6, 30);
    ///
    /// assert!(employee.is_active_on(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()));
    /// assert!(!employee.is_active_on(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
    /// ```
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.active_from.is_none_or(|from| from <= date)
            && self.active_to.is_none_or(|to| date <= to)
    }

    /// Returns true if the employment overlaps the inclusive range.
    pub fn is_active_during(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.active_from.is_none_or(|from| from <= end)
            && self.active_to.is_none_or(|to| start <= to)
    }

    /// Returns true if the record holds at least one external identifier.
    pub fn is_bound(&self) -> bool {
        self.scheduling_id.is_some() || self.payroll_code.is_some()
    }
}
