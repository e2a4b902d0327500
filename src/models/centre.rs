//! Centre (operating location) model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An operating location, the unit of scope for schedules, payroll and
/// data quality rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Centre {
    /// Internal centre code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Site identifier in the external scheduling system.
    #[serde(default)]
    pub scheduling_site_id: Option<String>,
    /// Site code in the external payroll system.
    #[serde(default)]
    pub payroll_site_code: Option<String>,
    /// City the centre is located in.
    #[serde(default)]
    pub city: Option<String>,
    /// Contact email for the centre.
    #[serde(default)]
    pub email: Option<String>,
    /// Opening date.
    #[serde(default)]
    pub opened_on: Option<NaiveDate>,
}
