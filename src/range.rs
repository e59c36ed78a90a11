//! Date window normalization.
//!
//! Every stage that puts a date window on the wire goes through
//! [`DateRange::normalize`]: the post query and the trend query must agree on
//! what "no dates selected" means.

use anyhow::{Context, Result};
use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// Lower bound used when neither end of the window is given.
pub fn epoch_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Lookback applied when only the end of the window is known.
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 36;

/// A fully concrete `{start, end}` window. Never reordered: a start after the
/// end is passed to the service as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Normalizes against today's UTC date.
    pub fn normalize(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self::normalize_at(start, end, today())
    }

    pub fn normalize_at(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Self {
        match (start, end) {
            (None, None) => Self {
                start: epoch_start(),
                end: today,
            },
            (start, end) => {
                let end = end.unwrap_or(today);
                let start = start.unwrap_or_else(|| lookback(end));
                Self { start, end }
            }
        }
    }

    pub fn start_param(&self) -> String {
        wire_date(self.start)
    }

    pub fn end_param(&self) -> String {
        wire_date(self.end)
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_param(), self.end_param())
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `YYYY-MM-DD`, the only date format the analytics service accepts.
pub fn wire_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses user input: a plain `YYYY-MM-DD` date or an RFC 3339 timestamp
/// (reduced to its UTC date).
pub fn parse_date_like(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    let ts = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("'{raw}' is neither YYYY-MM-DD nor an RFC 3339 timestamp"))?;
    Ok(ts.with_timezone(&Utc).date_naive())
}

fn lookback(end: NaiveDate) -> NaiveDate {
    // chrono clamps Feb 29 to Feb 28 when the target year is not a leap year
    end.checked_sub_months(Months::new(DEFAULT_LOOKBACK_MONTHS))
        .unwrap_or(NaiveDate::MIN)
}
