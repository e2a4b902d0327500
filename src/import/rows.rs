//! Conversion of validated rows into typed reconciler rows.

use crate::models::{MappedRow, PeriodWindow, Provenance};
use crate::reconcile::{CentreRow, PayrollRow};
use crate::store::StoreError;

use super::validation::{parse_date, parse_decimal};

fn required<'a>(row: &'a MappedRow, field: &str) -> Result<&'a str, StoreError> {
    row.get(field).ok_or_else(|| StoreError::Invalid {
        message: format!("missing '{field}'"),
    })
}

fn owned(row: &MappedRow, field: &str) -> Option<String> {
    row.get(field).map(str::to_string)
}

fn date_field(row: &MappedRow, field: &str) -> Result<Option<chrono::NaiveDate>, StoreError> {
    row.get(field)
        .map(|value| {
            parse_date(value).ok_or_else(|| StoreError::Invalid {
                message: format!("'{value}' is not a date ({field})"),
            })
        })
        .transpose()
}

fn decimal_field(row: &MappedRow, field: &str) -> Result<rust_decimal::Decimal, StoreError> {
    let value = required(row, field)?;
    parse_decimal(value).ok_or_else(|| StoreError::Invalid {
        message: format!("'{value}' is not a number ({field})"),
    })
}

impl TryFrom<&MappedRow> for CentreRow {
    type Error = StoreError;

    fn try_from(row: &MappedRow) -> Result<Self, Self::Error> {
        Ok(CentreRow {
            code: required(row, "code")?.to_string(),
            name: required(row, "name")?.to_string(),
            scheduling_site_id: owned(row, "scheduling_site_id"),
            payroll_site_code: owned(row, "payroll_site_code"),
            city: owned(row, "city"),
            email: owned(row, "email"),
            opened_on: date_field(row, "opened_on")?,
        })
    }
}

impl TryFrom<&MappedRow> for PayrollRow {
    type Error = StoreError;

    fn try_from(row: &MappedRow) -> Result<Self, Self::Error> {
        let start = date_field(row, "period_start")?.ok_or_else(|| StoreError::Invalid {
            message: "missing 'period_start'".to_string(),
        })?;
        let end = date_field(row, "period_end")?.ok_or_else(|| StoreError::Invalid {
            message: "missing 'period_end'".to_string(),
        })?;
        let period = PeriodWindow::new(start, end).map_err(|e| StoreError::Invalid {
            message: e.to_string(),
        })?;

        Ok(PayrollRow {
            payroll_code: required(row, "payroll_code")?.to_string(),
            employee_name: owned(row, "employee_name"),
            centre_code: owned(row, "centre_code"),
            period,
            worked_hours: decimal_field(row, "worked_hours")?,
            gross_cost: decimal_field(row, "gross_cost")?,
            provenance: Provenance::Manual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn payroll() -> MappedRow {
        MappedRow::new()
            .with("payroll_code", Some("N-100"))
            .with("employee_name", Some("Pilar"))
            .with("period_start", Some("01/03/2025"))
            .with("period_end", Some("2025-03-31"))
            .with("worked_hours", Some("152,5"))
            .with("gross_cost", Some("2287.50"))
    }

    #[test]
    fn test_payroll_row_conversion() {
        let row = PayrollRow::try_from(&payroll()).unwrap();

        assert_eq!(row.payroll_code, "N-100");
        assert_eq!(row.period.start, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(row.worked_hours, Decimal::new(1525, 1));
        assert_eq!(row.provenance, Provenance::Manual);
        assert!(row.centre_code.is_none());
    }

    #[test]
    fn test_inverted_period_is_invalid() {
        let row = payroll().with("period_end", Some("2025-02-01"));
        let error = PayrollRow::try_from(&row).unwrap_err();
        assert!(error.to_string().contains("Invalid period"));
    }

    #[test]
    fn test_centre_requires_name() {
        let row = MappedRow::new().with("code", Some("MAD01"));
        let error = CentreRow::try_from(&row).unwrap_err();
        assert_eq!(error.to_string(), "Invalid record: missing 'name'");
    }

    #[test]
    fn test_centre_conversion_keeps_optionals() {
        let row = MappedRow::new()
            .with("code", Some("VAL02"))
            .with("name", Some("Valencia Puerto"))
            .with("opened_on", Some("2019-05-20"))
            .with("city", None);
        let centre = CentreRow::try_from(&row).unwrap();
        assert_eq!(centre.opened_on, NaiveDate::from_ymd_opt(2019, 5, 20));
        assert!(centre.city.is_none());
    }
}
