//! Quarter roll-up of monthly records.
//!
//! Every numeric field is averaged over the months of a quarter (money and
//! percentages alike), the forecast flag is OR'd, and annotations are
//! concatenated in period order.

use crate::config::AggregatorConfig;
use crate::filter::resolve_period;
use crate::period::{Month, PeriodKey};
use crate::types::{Record, Value};
use crate::util::mean;
use std::collections::BTreeMap;
use tracing::debug;

pub fn aggregate_to_quarters(records: &[Record], config: &AggregatorConfig) -> Vec<Record> {
    struct Bucket<'a> {
        period_field: &'a str,
        items: Vec<(Month, &'a Record)>,
    }

    let fields = &config.fields;
    let mut buckets: BTreeMap<(i32, u32), Bucket> = BTreeMap::new();
    let mut skipped = 0usize;
    for r in records {
        let month = resolve_period(r, &fields.period_fields)
            .and_then(|(name, key)| Some((name, PeriodKey::parse(&key)?)));
        let Some((period_field, PeriodKey::Month(month))) = month else {
            skipped += 1;
            continue;
        };
        buckets
            .entry((month.year, month.quarter()))
            .or_insert_with(|| Bucket {
                period_field,
                items: Vec::new(),
            })
            .items
            .push((month, r));
    }
    if skipped > 0 {
        debug!(skipped, "rows without a month key left out of the quarter roll-up");
    }

    buckets
        .into_iter()
        .map(|((year, quarter), mut bucket)| {
            // Stable: rows of the same month keep their input order.
            bucket.items.sort_by_key(|(m, _)| *m);
            let items: Vec<&Record> = bucket.items.iter().map(|(_, r)| *r).collect();

            let mut out = Record::new();
            out.set(bucket.period_field, format!("{}-Q{}", year, quarter));
            for name in field_names(&items) {
                if name == bucket.period_field {
                    continue;
                }
                let value = if name == fields.forecast_field {
                    let any = items
                        .iter()
                        .any(|r| r.get(name).is_some_and(Value::is_forecast_flag));
                    Value::from(if any { "Y" } else { "N" })
                } else if name == fields.note_field {
                    join_notes(&items, name, &fields.note_separator)
                } else {
                    average_field(&items, name)
                };
                out.set(name, value);
            }
            out
        })
        .collect()
}

/// Union of field names across rows, in first-seen order.
fn field_names<'a>(items: &[&'a Record]) -> Vec<&'a str> {
    let mut names: Vec<&str> = Vec::new();
    for r in items.iter().copied() {
        for k in r.keys() {
            if !names.contains(&k) {
                names.push(k);
            }
        }
    }
    names
}

fn join_notes(items: &[&Record], name: &str, separator: &str) -> Value {
    let notes: Vec<String> = items
        .iter()
        .filter_map(|r| r.get(name))
        .map(|v| v.to_string())
        .filter(|s| !s.trim().is_empty())
        .collect();
    if notes.is_empty() {
        Value::Null
    } else {
        Value::Text(notes.join(separator))
    }
}

/// Mean of the numeric values of one field; values that are not numbers are
/// ignored for this field only.
///
/// A field with no numbers at all keeps a text value when every row agrees
/// on it (a constant dimension label), otherwise becomes null.
fn average_field(items: &[&Record], name: &str) -> Value {
    let values: Vec<&Value> = items.iter().filter_map(|r| r.get(name)).collect();
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();
    if let Some(avg) = mean(&numbers) {
        return Value::Number(avg);
    }
    let others: Vec<&Value> = values.into_iter().filter(|v| !v.is_null()).collect();
    match others.first() {
        Some(first) if matches!(first, Value::Text(_)) && others.iter().all(|v| v == first) => {
            (*first).clone()
        }
        _ => Value::Null,
    }
}
