//! Date-range parsing for the creation-date filter.

use crate::error::{ExtractError, Result};
use chrono::NaiveDate;
use std::fmt;
use std::time::Duration;

/// Accepted date format for `--start` / `--end`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns a validation error naming `field_name` if the value is not a date.
pub fn parse_date(s: &str, field_name: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
        ExtractError::validation(field_name, format!("expected YYYY-MM-DD, got '{s}'"))
    })
}

/// Inclusive creation-date filter. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Parse optional bounds.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a bound is malformed or `start > end`.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date(s, "start"))
            .transpose()?;
        let end = end
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date(s, "end"))
            .transpose()?;
        if let Some(end) = end {
            check_end(end)?;
        }
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ExtractError::validation(
                    "end",
                    format!("{end} is before start date {start}"),
                ));
            }
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// JQL clauses for the bounds that are set.
    ///
    /// A bare date in JQL means midnight, so the end day is included by
    /// comparing against the following day.
    #[must_use]
    pub fn jql_clauses(&self) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(start) = self.start {
            clauses.push(format!("created >= {}", start.format(DATE_FORMAT)));
        }
        if let Some(end) = self.end {
            clauses.push(match end.succ_opt() {
                Some(next) => format!("created < {}", next.format(DATE_FORMAT)),
                None => format!("created <= {}", end.format(DATE_FORMAT)),
            });
        }
        clauses
    }
}

/// The end bound needs a following day to be expressed inclusively.
fn check_end(end: NaiveDate) -> Result<()> {
    match end.succ_opt() {
        Some(_) => Ok(()),
        None => Err(ExtractError::validation(
            "end",
            format!("{end} is the last representable date"),
        )),
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |d: Option<NaiveDate>| d.map_or_else(|| "..".to_string(), |d| d.to_string());
        write!(f, "[{}, {}]", bound(self.start), bound(self.end))
    }
}

/// Seconds with two decimals, e.g. `3.25s`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
