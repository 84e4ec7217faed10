//! Acquisition date windows

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open range of calendar dates `[start, end)` in UTC.
///
/// An acquisition at `end` 00:00:00 UTC or later is outside the window, so
/// `start == end` selects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidTimeWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` dates
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |name: &'static str, s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| Error::InvalidParameter {
                name,
                value: s.to_string(),
                reason: e.to_string(),
            })
        };
        Self::new(parse("start", start)?, parse("end", end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether the window contains no instant
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        self.end.and_time(NaiveTime::MIN).and_utc()
    }

    /// Whether `instant` falls in `[start, end)`
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start_instant() && *instant < self.end_instant()
    }

    /// STAC / RFC 3339 interval string, `start/end`
    pub fn to_interval(&self) -> String {
        format!(
            "{}/{}",
            self.start_instant().format("%Y-%m-%dT%H:%M:%SZ"),
            self.end_instant().format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
