//! Production schedule views: weekly totals and achievement statistics.

use crate::config::AggregatorConfig;
use crate::period::PeriodKey;
use crate::types::{AchievementStats, Record, Value};
use crate::util::{average, round_to};
use std::collections::BTreeMap;
use tracing::debug;

/// Sum planned and actual output per week across every product line or
/// area, then derive the achievement rate and variance.
///
/// Weeks are emitted in (year, week) order. Rows with a malformed week key
/// are skipped.
pub fn aggregate_by_week(records: &[Record], config: &AggregatorConfig) -> Vec<Record> {
    struct Acc {
        week_key: String,
        year: Value,
        week_number: Value,
        planned: f64,
        actual: f64,
        note: String,
    }

    let w = &config.weekly;
    let note_field = config.fields.note_field.as_str();
    let mut weeks: BTreeMap<(i32, u32), Acc> = BTreeMap::new();
    let mut skipped = 0usize;

    for r in records {
        let key = r.get(&w.week_field).and_then(Value::as_key);
        let Some((key, PeriodKey::Week { year, week })) =
            key.and_then(|k| PeriodKey::parse(&k).map(|p| (k, p)))
        else {
            skipped += 1;
            continue;
        };

        let acc = weeks.entry((year, week)).or_insert_with(|| Acc {
            week_key: key,
            year: r.get(&w.year_field).cloned().unwrap_or(Value::from(year)),
            week_number: r
                .get(&w.week_number_field)
                .cloned()
                .unwrap_or(Value::Number(week as f64)),
            planned: 0.0,
            actual: 0.0,
            note: String::new(),
        });
        acc.planned += r.get(&w.planned_field).and_then(Value::as_number).unwrap_or(0.0);
        acc.actual += r.get(&w.actual_field).and_then(Value::as_number).unwrap_or(0.0);

        // First non-empty note wins.
        if acc.note.is_empty() {
            if let Some(note) = r.get(note_field).map(|v| v.to_string()) {
                acc.note = note.trim().to_string();
            }
        }
    }
    if skipped > 0 {
        debug!(skipped, "rows without a week key left out of the weekly roll-up");
    }

    weeks
        .into_values()
        .map(|acc| {
            let rate = if acc.planned > 0.0 {
                round_to(acc.actual / acc.planned * 100.0, 1)
            } else {
                0.0
            };
            Record::new()
                .with(w.week_field.as_str(), acc.week_key)
                .with(w.year_field.as_str(), acc.year)
                .with(w.week_number_field.as_str(), acc.week_number)
                .with(w.planned_field.as_str(), acc.planned)
                .with(w.actual_field.as_str(), acc.actual)
                .with(note_field, acc.note)
                .with(w.rate_field.as_str(), rate)
                .with(w.variance_field.as_str(), acc.actual - acc.planned)
        })
        .collect()
}

/// Summary of achievement rates and output totals. Empty input yields all
/// zeros; a missing rate counts as 0.
pub fn achievement_stats(records: &[Record], config: &AggregatorConfig) -> AchievementStats {
    if records.is_empty() {
        return AchievementStats::default();
    }
    let w = &config.weekly;
    let number = |r: &Record, field: &str| r.get(field).and_then(Value::as_number).unwrap_or(0.0);

    let rates: Vec<f64> = records.iter().map(|r| number(r, w.rate_field.as_str())).collect();
    let min = rates.iter().copied().fold(f64::INFINITY, f64::min);
    let max = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let total_planned: f64 = records.iter().map(|r| number(r, w.planned_field.as_str())).sum();
    let total_actual: f64 = records.iter().map(|r| number(r, w.actual_field.as_str())).sum();
    let overall = if total_planned > 0.0 {
        total_actual / total_planned * 100.0
    } else {
        0.0
    };

    AchievementStats {
        avg_achievement: round_to(average(&rates), 1),
        min_achievement: round_to(min, 1),
        max_achievement: round_to(max, 1),
        total_planned,
        total_actual,
        overall_achievement: round_to(overall, 1),
    }
}
