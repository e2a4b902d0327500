//! Import validation.
//!
//! Checks mapped rows against the rules of their file kind and classifies
//! every violation as critical or non-critical. Critical violations always
//! block the import; non-critical ones block it unless the caller forces the
//! import, in which case the offending fields are written as null.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::FileKindRules;
use crate::error::{EngineError, EngineResult};
use crate::models::{ImportRequest, MappedRow};

/// Cell values treated as null.
pub const NULL_SENTINELS: [&str; 4] = ["", "#N/D", "#N/A", "N/A"];

/// Accepted date layouts, tried in order.
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Returns `None` for null sentinels, otherwise the trimmed value.
pub fn normalize_cell(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if NULL_SENTINELS
        .iter()
        .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a date in any of [`DATE_FORMATS`].
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value.trim(), format).ok())
}

/// Parses a decimal, accepting a comma as decimal separator.
///
/// # Examples
///
/// ```
/// use workforce_sync::import::parse_decimal;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_decimal("12,5"), Some(Decimal::new(125, 1)));
/// assert_eq!(parse_decimal("1600.00"), Some(Decimal::new(160000, 2)));
/// assert_eq!(parse_decimal("1.234,5"), None);
/// ```
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let value = value.trim();
    let candidate = if value.contains(',') && !value.contains('.') {
        value.replacen(',', ".", 1)
    } else {
        value.to_string()
    };
    Decimal::from_str(&candidate).ok()
}

fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Whether a violation blocks the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationLevel {
    /// Always blocks.
    Critical,
    /// Blocks unless forced.
    NonCritical,
}

/// The rule a violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required field is null.
    MissingRequired,
    /// A uniqueness key repeats an earlier row.
    DuplicateKey,
    /// An email field is malformed.
    InvalidEmail,
    /// A date field is malformed.
    InvalidDate,
    /// A numeric field is malformed.
    InvalidNumber,
}

/// One broken rule on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Zero-based row position.
    pub row_index: usize,
    /// Canonical field.
    pub field: String,
    /// The offending value, if any.
    pub value: Option<String>,
    /// Broken rule.
    pub kind: ViolationKind,
    /// Severity.
    pub level: ViolationLevel,
    /// Human-readable explanation.
    pub message: String,
}

/// Validation outcome of a batch of mapped rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Rows after null normalization.
    pub rows: Vec<MappedRow>,
    /// Violations in row order.
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Number of critical violations.
    pub fn critical_count(&self) -> usize {
        self.count(ViolationLevel::Critical)
    }

    /// Number of non-critical violations.
    pub fn non_critical_count(&self) -> usize {
        self.count(ViolationLevel::NonCritical)
    }

    fn count(&self, level: ViolationLevel) -> usize {
        self.violations.iter().filter(|v| v.level == level).count()
    }

    /// Indexes of rows without violations.
    pub fn clean_rows(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|index| !self.is_dirty(*index))
            .collect()
    }

    /// Indexes of rows with at least one violation.
    pub fn dirty_rows(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|index| self.is_dirty(*index))
            .collect()
    }

    fn is_dirty(&self, index: usize) -> bool {
        self.violations.iter().any(|v| v.row_index == index)
    }

    /// Applies the import policy and returns the rows to write.
    ///
    /// Fails with [`EngineError::ImportBlocked`] on any critical violation
    /// and with [`EngineError::ForceRequired`] on unforced non-critical
    /// ones. When forced, every field with a non-critical violation is
    /// nulled.
    pub fn rows_to_write(&self, request: &ImportRequest) -> EngineResult<Vec<MappedRow>> {
        let critical = self.critical_count();
        let non_critical = self.non_critical_count();

        if critical > 0 {
            return Err(EngineError::ImportBlocked {
                critical,
                non_critical,
            });
        }
        if non_critical > 0 && !request.force_non_critical {
            return Err(EngineError::ForceRequired { non_critical });
        }

        let mut rows = self.rows.clone();
        for violation in &self.violations {
            if let Some(row) = rows.get_mut(violation.row_index) {
                row.clear(&violation.field);
            }
        }
        Ok(rows)
    }
}

/// Validates mapped rows against the rules of a file kind.
///
/// Null sentinels are normalized first. Duplicate uniqueness keys produce
/// one critical violation per repeated row. Malformed values are critical in
/// required fields and non-critical elsewhere.
pub fn validate_rows(rows: Vec<MappedRow>, rules: &FileKindRules) -> ValidationReport {
    let mut rows = rows;
    for row in &mut rows {
        row.map_values(|value| normalize_cell(value.as_deref()));
    }

    let mut violations = Vec::new();
    let mut first_seen: HashMap<(&str, String), usize> = HashMap::new();

    for (row_index, row) in rows.iter().enumerate() {
        for field in &rules.required {
            if row.get(field).is_none() {
                violations.push(Violation {
                    row_index,
                    field: field.clone(),
                    value: None,
                    kind: ViolationKind::MissingRequired,
                    level: ViolationLevel::Critical,
                    message: format!("required field '{field}' is empty"),
                });
            }
        }

        for field in &rules.unique {
            let Some(value) = row.get(field) else {
                continue;
            };
            match first_seen.get(&(field.as_str(), value.to_string())) {
                Some(first) => violations.push(Violation {
                    row_index,
                    field: field.clone(),
                    value: Some(value.to_string()),
                    kind: ViolationKind::DuplicateKey,
                    level: ViolationLevel::Critical,
                    message: format!("'{value}' duplicates {field} of row {}", first + 1),
                }),
                None => {
                    first_seen.insert((field.as_str(), value.to_string()), row_index);
                }
            }
        }

        let format_checks: [(&[String], ViolationKind, fn(&str) -> bool); 3] = [
            (&rules.email_fields, ViolationKind::InvalidEmail, is_valid_email),
            (&rules.date_fields, ViolationKind::InvalidDate, |v| parse_date(v).is_some()),
            (&rules.numeric_fields, ViolationKind::InvalidNumber, |v| parse_decimal(v).is_some()),
        ];
        for (fields, kind, is_valid) in format_checks {
            for field in fields {
                let Some(value) = row.get(field) else {
                    continue;
                };
                if is_valid(value) {
                    continue;
                }
                let level = if rules.required.contains(field) {
                    ViolationLevel::Critical
                } else {
                    ViolationLevel::NonCritical
                };
                violations.push(Violation {
                    row_index,
                    field: field.clone(),
                    value: Some(value.to_string()),
                    kind,
                    level,
                    message: format!("'{value}' is not a valid {} for '{field}'", kind_noun(kind)),
                });
            }
        }
    }

    ValidationReport { rows, violations }
}

fn kind_noun(kind: ViolationKind) -> &'static str {
    match kind {
        ViolationKind::InvalidEmail => "email",
        ViolationKind::InvalidDate => "date",
        ViolationKind::InvalidNumber => "number",
        ViolationKind::MissingRequired | ViolationKind::DuplicateKey => "value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldAliases;

    fn centre_rules() -> FileKindRules {
        FileKindRules {
            aliases: vec![FieldAliases {
                field: "code".to_string(),
                aliases: vec![],
            }],
            required: vec!["code".to_string(), "name".to_string()],
            unique: vec!["code".to_string()],
            email_fields: vec!["email".to_string()],
            date_fields: vec!["opened_on".to_string()],
            numeric_fields: vec![],
        }
    }

    fn centre(code: Option<&str>, name: Option<&str>) -> MappedRow {
        MappedRow::new().with("code", code).with("name", name)
    }

    #[test]
    fn test_sentinels_become_null() {
        for sentinel in ["", "  ", "#N/D", "#N/A", "N/A", "n/a"] {
            assert_eq!(normalize_cell(Some(sentinel)), None, "{sentinel:?}");
        }
        assert_eq!(normalize_cell(Some(" MAD01 ")), Some("MAD01".to_string()));
        assert_eq!(normalize_cell(None), None);
    }

    #[test]
    fn test_three_rows_missing_and_duplicate() {
        let rows = vec![
            centre(Some("MAD01"), Some("Madrid")),
            centre(Some("BCN01"), None),
            centre(Some("MAD01"), Some("Madrid bis")),
        ];

        let report = validate_rows(rows, &centre_rules());

        assert_eq!(report.critical_count(), 2);
        assert_eq!(report.non_critical_count(), 0);
        assert_eq!(report.dirty_rows(), vec![1, 2]);
        assert_eq!(report.clean_rows(), vec![0]);

        let result = report.rows_to_write(&ImportRequest::default());
        assert!(matches!(
            result,
            Err(EngineError::ImportBlocked { critical: 2, non_critical: 0 })
        ));
    }

    #[test]
    fn test_duplicates_count_once_per_repeated_row() {
        let rows = (0..4).map(|_| centre(Some("MAD01"), Some("x"))).collect();
        let report = validate_rows(rows, &centre_rules());

        let duplicates: Vec<usize> = report
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::DuplicateKey)
            .map(|v| v.row_index)
            .collect();
        assert_eq!(duplicates, vec![1, 2, 3]);
    }

    #[test]
    fn test_null_keys_are_not_duplicates() {
        let rows = vec![centre(Some("#N/A"), Some("x")), centre(None, Some("y"))];
        let report = validate_rows(rows, &centre_rules());
        assert!(report.violations.iter().all(|v| v.kind == ViolationKind::MissingRequired));
    }

    #[test]
    fn test_malformed_optional_fields_are_non_critical() {
        let rows = vec![
            centre(Some("MAD01"), Some("Madrid"))
                .with("email", Some("madrid-at-example.com"))
                .with("opened_on", Some("31/02/2020")),
            centre(Some("BCN01"), Some("Barcelona"))
                .with("email", Some("bcn@example.com"))
                .with("opened_on", Some("15/06/2019")),
        ];

        let report = validate_rows(rows, &centre_rules());

        assert_eq!(report.critical_count(), 0);
        assert_eq!(report.non_critical_count(), 2);
        assert!(matches!(
            report.rows_to_write(&ImportRequest::default()),
            Err(EngineError::ForceRequired { non_critical: 2 })
        ));

        let forced = ImportRequest {
            force_non_critical: true,
            ..ImportRequest::default()
        };
        let rows = report.rows_to_write(&forced).unwrap();
        assert_eq!(rows[0].get("email"), None);
        assert_eq!(rows[0].get("opened_on"), None);
        assert_eq!(rows[0].get("code"), Some("MAD01"));
        assert_eq!(rows[1].get("email"), Some("bcn@example.com"));
    }

    #[test]
    fn test_malformed_required_number_is_critical() {
        let rules = FileKindRules {
            required: vec!["worked_hours".to_string()],
            numeric_fields: vec!["worked_hours".to_string(), "bonus".to_string()],
            unique: vec![],
            ..centre_rules()
        };
        let rows = vec![
            MappedRow::new()
                .with("worked_hours", Some("ciento"))
                .with("bonus", Some("diez")),
        ];

        let report = validate_rows(rows, &rules);

        assert_eq!(report.critical_count(), 1);
        assert_eq!(report.non_critical_count(), 1);
    }

    #[test]
    fn test_clean_import_passes_through() {
        let rows = vec![centre(Some("MAD01"), Some("Madrid"))];
        let report = validate_rows(rows, &centre_rules());
        let rows = report.rows_to_write(&ImportRequest::default()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 7);
        assert_eq!(parse_date("2025-03-07"), expected);
        assert_eq!(parse_date("07/03/2025"), expected);
        assert_eq!(parse_date("07-03-2025"), expected);
        assert_eq!(parse_date("March 7"), None);
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("ana@example.es"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("@example.es"));
        assert!(!is_valid_email("ana @example.es"));
        assert!(!is_valid_email("ana@@example.es"));
    }
}
