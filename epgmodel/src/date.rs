//! Calendar dates as day counts since the Unix epoch.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar day, stored as the number of days since 1970-01-01 (UTC).
///
/// The integer form keeps file names compact and age-sortable (a
/// lexicographic sort of equal-width day counts is a chronological
/// sort) and makes range iteration a plain counter. Conversion to and
/// from [`chrono::NaiveDate`] covers everything calendar-shaped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Date(i32);

impl Date {
    /// Builds a date from a raw day count since the epoch.
    pub fn from_days(days: i32) -> Self {
        Self(days)
    }

    /// The raw day count since the epoch.
    pub fn days(&self) -> i32 {
        self.0
    }

    /// Today's date in UTC.
    pub fn today() -> Self {
        Self::from_naive(Utc::now().date_naive())
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::from_naive)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self((date - epoch()).num_days() as i32)
    }

    pub fn to_naive(&self) -> NaiveDate {
        epoch() + chrono::Duration::days(self.0 as i64)
    }

    /// Returns this date shifted by `days` (negative shifts backward).
    pub fn add_days(&self, days: i32) -> Self {
        Self(self.0 + days)
    }

    /// Number of days from `self` to `other` (positive when `other` is later).
    pub fn days_until(&self, other: Date) -> i32 {
        other.0 - self.0
    }

    pub fn year(&self) -> i32 {
        self.to_naive().year()
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date")
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_naive().format("%Y-%m-%d"))
    }
}
