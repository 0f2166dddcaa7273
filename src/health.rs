//! Machine health views: high-risk machines, risk-level groups and per-type
//! statistics.

use crate::config::{AggregatorConfig, HealthConfig};
use crate::types::{MachineTypeStats, Record, Value};
use crate::util::{average, round_to};

fn health_score(r: &Record, config: &HealthConfig) -> Option<f64> {
    r.get(&config.health_field).and_then(Value::as_number)
}

/// Machines scoring below the high-risk threshold, worst first. Rows
/// without a numeric score are left out.
pub fn high_risk_machines(records: &[Record], config: &AggregatorConfig) -> Vec<Record> {
    let h = &config.health;
    let mut risky: Vec<(f64, &Record)> = records
        .iter()
        .filter_map(|r| {
            let score = health_score(r, h)?;
            (score < h.high_risk_threshold).then_some((score, r))
        })
        .collect();
    risky.sort_by(|a, b| a.0.total_cmp(&b.0));
    risky.into_iter().map(|(_, r)| r.clone()).collect()
}

/// Machines grouped by their risk level, in the configured level order.
/// Every configured level is present, possibly empty; unknown levels are
/// dropped.
pub fn group_by_risk_level(records: &[Record], config: &AggregatorConfig) -> Vec<(String, Vec<Record>)> {
    let h = &config.health;
    h.risk_levels
        .iter()
        .map(|level| {
            let members = records
                .iter()
                .filter(|r| {
                    r.get(&h.risk_level_field)
                        .is_some_and(|v| v.to_string() == *level)
                })
                .cloned()
                .collect();
            (level.clone(), members)
        })
        .collect()
}

/// Count, mean health (1 decimal) and high-risk share per machine type, in
/// first-seen order. Machines without a score are counted but do not enter
/// the mean.
pub fn machine_type_stats(records: &[Record], config: &AggregatorConfig) -> Vec<MachineTypeStats> {
    #[derive(Default)]
    struct Acc {
        count: usize,
        scores: Vec<f64>,
        high_risk: usize,
    }

    let h = &config.health;
    let mut types: Vec<(String, Acc)> = Vec::new();
    for r in records {
        let machine_type = r
            .get(&h.machine_type_field)
            .map(|v| v.to_string())
            .unwrap_or_default();
        let found = types.iter().position(|(t, _)| *t == machine_type);
        let idx = match found {
            Some(i) => i,
            None => {
                types.push((machine_type, Acc::default()));
                types.len() - 1
            }
        };

        let acc = &mut types[idx].1;
        acc.count += 1;
        if let Some(score) = health_score(r, h) {
            acc.scores.push(score);
            if score < h.high_risk_threshold {
                acc.high_risk += 1;
            }
        }
    }

    types
        .into_iter()
        .map(|(machine_type, acc)| MachineTypeStats {
            machine_type,
            count: acc.count,
            avg_health: round_to(average(&acc.scores), 1),
            high_risk_count: acc.high_risk,
            high_risk_ratio: round_to(acc.high_risk as f64 / acc.count as f64 * 100.0, 1),
        })
        .collect()
}
