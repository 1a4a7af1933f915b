use crate::error::{EiaError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

/// Sampling frequency of a series, also the `frequency=` query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Hourly,
    Daily,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = EiaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            other => Err(EiaError::invalid(format!(
                "frequency must be 'hourly' or 'daily', got '{other}'"
            ))),
        }
    }
}

/// A range endpoint at day or hour precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    Date(NaiveDate),
    Hour(NaiveDateTime),
}

impl Bound {
    /// Hour bound; minutes and seconds are dropped since the API only takes hours.
    pub fn hour(dt: NaiveDateTime) -> Self {
        let truncated = dt
            .with_nanosecond(0)
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_minute(0))
            .unwrap_or(dt);
        Bound::Hour(truncated)
    }

    pub fn date(d: NaiveDate) -> Self {
        Bound::Date(d)
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Bound::Date(_) => Frequency::Daily,
            Bound::Hour(_) => Frequency::Hourly,
        }
    }

    /// Move by `units` periods of this bound's own granularity.
    pub fn shift(&self, units: i64) -> Result<Self> {
        let shifted = match self {
            Bound::Date(d) => d
                .checked_add_signed(Duration::days(units))
                .map(Bound::Date),
            Bound::Hour(dt) => dt
                .checked_add_signed(Duration::hours(units))
                .map(Bound::Hour),
        };
        shifted.ok_or_else(|| {
            EiaError::invalid(format!("{self} shifted by {units} is out of range"))
        })
    }

    /// Query-string rendering: `YYYY-MM-DD` or `YYYY-MM-DDTHH`.
    pub fn to_param(&self) -> String {
        match self {
            Bound::Date(d) => d.format("%Y-%m-%d").to_string(),
            Bound::Hour(dt) => dt.format("%Y-%m-%dT%H").to_string(),
        }
    }

    /// Number of periods from `self` to `other`, both inclusive.
    pub fn periods_until(&self, other: &Bound) -> Option<i64> {
        match (self, other) {
            (Bound::Date(a), Bound::Date(b)) => Some((*b - *a).num_days() + 1),
            (Bound::Hour(a), Bound::Hour(b)) => Some((*b - *a).num_hours() + 1),
            _ => None,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}

impl FromStr for Bound {
    type Err = EiaError;

    /// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH` and `YYYY-MM-DDTHH:MM`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Bound::Date(d));
        }
        let padded = if s.len() == 13 { format!("{s}:00") } else { s.to_string() };
        NaiveDateTime::parse_from_str(&padded, "%Y-%m-%dT%H:%M")
            .map(Bound::hour)
            .map_err(|e| EiaError::invalid(format!("cannot parse bound '{s}': {e}")))
    }
}

/// Inclusive `[start, end]` with both ends at the same precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: Bound,
    end: Bound,
}

impl TimeRange {
    pub fn new(start: Bound, end: Bound) -> Result<Self> {
        if start.frequency() != end.frequency() {
            return Err(EiaError::invalid(format!(
                "start {start} and end {end} mix date and hour precision"
            )));
        }
        if start > end {
            return Err(EiaError::invalid(format!("start {start} is after end {end}")));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Bound {
        self.start
    }

    pub fn end(&self) -> Bound {
        self.end
    }

    pub fn frequency(&self) -> Frequency {
        self.start.frequency()
    }

    /// Inclusive period count.
    pub fn len(&self) -> i64 {
        self.start.periods_until(&self.end).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
