//! Year and dimension filters.
//!
//! `filter_by_year` is the entry point every dashboard page goes through:
//! a concrete year keeps matching rows, while `"all"` on monthly data
//! switches to the quarter roll-up.

use crate::config::AggregatorConfig;
use crate::period::{leading_year, Granularity, PeriodKey};
use crate::rollup::aggregate_to_quarters;
use crate::types::Record;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Year dropdown selection. Any string other than `"all"` is taken as a
/// year and compared by plain string equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearSelector {
    All,
    Year(String),
}

impl From<&str> for YearSelector {
    fn from(s: &str) -> Self {
        if s == "all" {
            YearSelector::All
        } else {
            YearSelector::Year(s.to_string())
        }
    }
}

impl FromStr for YearSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(YearSelector::from(s))
    }
}

impl fmt::Display for YearSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearSelector::All => f.write_str("all"),
            YearSelector::Year(y) => f.write_str(y),
        }
    }
}

/// Resolve the period field of a record: the first candidate that is
/// present and non-null. Returns the field name and its key string.
pub fn resolve_period<'a>(record: &Record, candidates: &'a [String]) -> Option<(&'a str, String)> {
    candidates.iter().find_map(|name| {
        let value = record.get(name).filter(|v| !v.is_null())?;
        Some((name.as_str(), value.as_key()?))
    })
}

/// Granularity of a dataset, judged from its first well-formed period key.
pub fn detect_granularity(records: &[Record], candidates: &[String]) -> Option<Granularity> {
    records
        .iter()
        .filter_map(|r| resolve_period(r, candidates))
        .find_map(|(_, key)| PeriodKey::parse(&key))
        .map(|key| key.granularity())
}

/// Keep the rows of one year, or roll monthly data up to quarters for
/// `"all"`. Other granularities pass through untouched for `"all"`.
pub fn filter_by_year(
    records: &[Record],
    selector: &YearSelector,
    config: &AggregatorConfig,
) -> Vec<Record> {
    let candidates = &config.fields.period_fields;
    match selector {
        YearSelector::All => match detect_granularity(records, candidates) {
            Some(Granularity::Month) => aggregate_to_quarters(records, config),
            _ => records.to_vec(),
        },
        YearSelector::Year(year) => {
            let mut skipped = 0usize;
            let kept: Vec<Record> = records
                .iter()
                .filter(|r| {
                    let Some((_, key)) = resolve_period(r, candidates) else {
                        skipped += 1;
                        return false;
                    };
                    if PeriodKey::parse(&key).is_none() {
                        skipped += 1;
                        return false;
                    }
                    leading_year(&key) == Some(year.as_str())
                })
                .cloned()
                .collect();
            if skipped > 0 {
                debug!(skipped, year = %year, "rows without a usable period key excluded");
            }
            kept
        }
    }
}

/// Keep rows whose `field` equals `selector` (product line, area, region).
/// `"all"` passes every row through.
pub fn filter_by_dimension(records: &[Record], field: &str, selector: &str) -> Vec<Record> {
    if selector == "all" {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| r.get(field).is_some_and(|v| v.to_string() == selector))
        .cloned()
        .collect()
}
