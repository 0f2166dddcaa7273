//! Period keys: the string field naming which year, quarter, month, week or
//! update date a record belongs to.
//!
//! Keys are parsed positionally. The first four characters are always a
//! four-digit year; month keys carry a two-digit month at characters 6-7.
use crate::util::parse_date_safe;
use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Month { year, month })
    }

    /// Parse an exact `YYYY-MM` key.
    pub fn parse(s: &str) -> Option<Self> {
        match PeriodKey::parse(s)? {
            PeriodKey::Month(m) => Some(m),
            _ => None,
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Month {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Move `n` months forward, rolling over year boundaries.
    pub fn advance(self, n: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) + n as i64;
        Month {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn quarter(self) -> u32 {
        (self.month + 2) / 3
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Resolution of a dataset's period axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Quarter,
    Month,
    Week,
    Date,
}

/// A parsed period key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PeriodKey {
    /// `YYYY`
    Year(i32),
    /// `YYYY-Qn`
    Quarter { year: i32, quarter: u32 },
    /// `YYYY-MM`
    Month(Month),
    /// `YYYY-Www`
    Week { year: i32, week: u32 },
    /// `YYYY-MM-DD`
    Date(NaiveDate),
}

impl PeriodKey {
    /// Parse any of the supported key shapes. Malformed keys yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if !s.is_ascii() {
            return None;
        }
        let year: i32 = leading_year(s)?.parse().ok()?;
        let b = s.as_bytes();
        match b.len() {
            4 => Some(PeriodKey::Year(year)),
            7 if b[4] == b'-' && b[5] == b'Q' => {
                let quarter = digits(&s[6..7])?;
                (1..=4)
                    .contains(&quarter)
                    .then_some(PeriodKey::Quarter { year, quarter })
            }
            7 if b[4] == b'-' => Month::new(year, digits(&s[5..7])?).map(PeriodKey::Month),
            8 if b[4] == b'-' && b[5] == b'W' => {
                let week = digits(&s[6..8])?;
                (1..=53)
                    .contains(&week)
                    .then_some(PeriodKey::Week { year, week })
            }
            10 if b[4] == b'-' && b[7] == b'-' => parse_date_safe(Some(s)).map(PeriodKey::Date),
            _ => None,
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            PeriodKey::Year(_) => Granularity::Year,
            PeriodKey::Quarter { .. } => Granularity::Quarter,
            PeriodKey::Month(_) => Granularity::Month,
            PeriodKey::Week { .. } => Granularity::Week,
            PeriodKey::Date(_) => Granularity::Date,
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Year(y) => write!(f, "{:04}", y),
            PeriodKey::Quarter { year, quarter } => write!(f, "{:04}-Q{}", year, quarter),
            PeriodKey::Month(m) => write!(f, "{}", m),
            PeriodKey::Week { year, week } => write!(f, "{:04}-W{:02}", year, week),
            PeriodKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// The leading four-digit year of a key, or `None` if the key does not
/// start with one.
pub fn leading_year(s: &str) -> Option<&str> {
    let head = s.get(..4)?;
    head.bytes().all(|c| c.is_ascii_digit()).then_some(head)
}

fn digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
