//! Time values and viewport ranges.
//!
//! Two coordinate systems describe what a chart shows:
//! - [`TimeRange`] - wall-clock window in Unix seconds
//! - [`LogicalRange`] - fractional bar indices, where `0` is the first bar

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A point in time as supplied by a data source.
///
/// Data sources deliver either numeric timestamps or textual dates. The
/// original representation is kept so series data can be handed back to the
/// renderer unchanged; [`Time::to_seconds`] converts on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Time {
    Timestamp(f64),
    Text(String),
}

impl Time {
    /// Convert to Unix seconds.
    ///
    /// Accepts `YYYY-MM-DD` (UTC midnight), `YYYY-MM-DD HH:MM:SS`, RFC 3339
    /// and numeric strings. Millisecond timestamps (13+ digits) are scaled
    /// down to seconds. Returns `None` when the value cannot be converted.
    #[must_use]
    pub fn to_seconds(&self) -> Option<f64> {
        let seconds = match self {
            Time::Timestamp(ts) => *ts,
            Time::Text(text) => parse_time_text(text.trim())?,
        };
        if !seconds.is_finite() {
            return None;
        }
        if seconds.abs() > 1e12 {
            return Some(seconds / 1000.0);
        }
        Some(seconds)
    }
}

impl From<f64> for Time {
    fn from(ts: f64) -> Self {
        Time::Timestamp(ts)
    }
}

impl From<i64> for Time {
    fn from(ts: i64) -> Self {
        Time::Timestamp(ts as f64)
    }
}

impl From<&str> for Time {
    fn from(text: &str) -> Self {
        Time::Text(text.to_string())
    }
}

impl From<String> for Time {
    fn from(text: String) -> Self {
        Time::Text(text)
    }
}

fn parse_time_text(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = text.parse::<f64>() {
        return Some(ts);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp() as f64);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp() as f64);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp() as f64)
}

/// Visible window in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: f64,
    pub to: f64,
}

impl TimeRange {
    /// Build a range, rejecting non-finite bounds and `from >= to`.
    #[must_use]
    pub fn new(from: f64, to: f64) -> Option<Self> {
        let range = Self { from, to };
        range.is_valid().then_some(range)
    }

    /// Build a range from two data-source times.
    #[must_use]
    pub fn from_times(from: &Time, to: &Time) -> Option<Self> {
        Self::new(from.to_seconds()?, to.to_seconds()?)
    }

    /// Both bounds finite and strictly increasing.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.from.is_finite() && self.to.is_finite() && self.from < self.to
    }

    /// Both bounds finite and non-negative.
    ///
    /// This is the check applied to ranges read back from a renderer, where
    /// `{0, i32::MAX}` is a legitimate answer but negative values are not.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.from.is_finite() && self.to.is_finite() && self.from >= 0.0 && self.to >= 0.0
    }

    #[must_use]
    pub fn span(&self) -> f64 {
        self.to - self.from
    }
}

/// Visible window in fractional bar indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogicalRange {
    pub from: f64,
    pub to: f64,
}

impl LogicalRange {
    #[must_use]
    pub fn new(from: f64, to: f64) -> Self {
        Self { from, to }
    }

    /// A range scrolled before the first bar. Never propagated to other charts.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.from < 0.0
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.from.is_finite() && self.to.is_finite()
    }

    /// Finite and not scrolled before the first bar.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.is_finite() && !self.is_negative()
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.to - self.from
    }

    /// Compare both bounds within `tolerance` bars.
    #[must_use]
    pub fn approx_eq(&self, other: &LogicalRange, tolerance: f64) -> bool {
        (self.from - other.from).abs() <= tolerance && (self.to - other.to).abs() <= tolerance
    }
}
