//! Calendar-day keys and day arithmetic.
//!
//! Everything here works on local calendar days: time-of-day and the UTC
//! offset are discarded as soon as an instant becomes a [`DateKey`], so DST
//! transitions never shift a day boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Sortable calendar-day identifier, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// Shifts the key by `delta` calendar days.
    pub fn offset(self, delta: i64) -> Self {
        Self(add_days(self.0, delta))
    }

    /// The previous calendar day, or `None` at the start of the supported range.
    pub fn pred(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    /// Signed number of days from `other` to `self`.
    pub fn days_since(self, other: DateKey) -> i64 {
        self.0.signed_duration_since(other.0).num_days()
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_KEY_FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DATE_KEY_FORMAT)
            .map(Self)
            .map_err(|_| ParseError::DateKey(s.to_string()))
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Maps an instant to the calendar day it falls on in its own time zone.
/// Pass a `DateTime<Local>` (or the local fixed offset) to get local-day keys.
pub fn date_key<Tz: TimeZone>(instant: &DateTime<Tz>) -> DateKey {
    DateKey(instant.date_naive())
}

/// Calendar-day arithmetic. Saturates at the ends of the representable range.
pub fn add_days(date: NaiveDate, delta: i64) -> NaiveDate {
    let magnitude = Days::new(delta.unsigned_abs());
    if delta >= 0 {
        date.checked_add_days(magnitude).unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(magnitude).unwrap_or(NaiveDate::MIN)
    }
}

pub fn is_same_day<Tz: TimeZone>(a: &DateTime<Tz>, b: &DateTime<Tz>) -> bool {
    date_key(a) == date_key(b)
}
