//! Period window model.
//!
//! A [`PeriodWindow`] is an inclusive date range used to scope payroll
//! periods, data quality recalculations and alert evaluations.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodWindow {
    /// First day of the window (inclusive).
    pub start: NaiveDate,
    /// Last day of the window (inclusive).
    pub end: NaiveDate,
}

impl PeriodWindow {
    /// Creates a window, rejecting ranges that end before they start.
    ///
    /// # Examples
    ///
    /// ```
    /// use workforce_sync::models::PeriodWindow;
    /// use chrono::NaiveDate;
    ///
    /// let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
    /// let window = PeriodWindow::new(start, end).unwrap();
    /// assert_eq!(window.days(), 31);
    ///
    /// assert!(PeriodWindow::new(end, start).is_err());
    /// ```
    pub fn new(start: NaiveDate, end: NaiveDate) -> EngineResult<Self> {
        if start > end {
            return Err(EngineError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns the window of `days` days ending on `end` (inclusive).
    ///
    /// A lookback of zero days yields the single day `end`.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    /// Returns the calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let next_month = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        let end = next_month.map_or(date, |first| first - Duration::days(1));
        Self { start, end }
    }

    /// Returns the Monday-to-Sunday week containing `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_monday());
        let start = date - Duration::days(offset);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    /// Returns true if `date` falls within the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Returns true if the two windows share at least one day.
    pub fn overlaps(&self, other: &PeriodWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns the number of days in the window.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Returns the number of days shared with `other`.
    pub fn overlap_days(&self, other: &PeriodWindow) -> i64 {
        if !self.overlaps(other) {
            return 0;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (end - start).num_days() + 1
    }
}

impl std::fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
