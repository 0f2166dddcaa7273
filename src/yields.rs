//! Product yield views: single-month slices, the area-by-product pivot and
//! yield statistics.

use crate::config::AggregatorConfig;
use crate::period::Month;
use crate::types::{Record, Value, YieldStats};
use crate::util::{average, round_to};

/// Rows of one month, matched by exact key. `None` keeps every row.
pub fn filter_by_month(records: &[Record], month: Option<&str>, config: &AggregatorConfig) -> Vec<Record> {
    let Some(month) = month.filter(|m| !m.is_empty()) else {
        return records.to_vec();
    };
    let field = config.yields.month_field.as_str();
    records
        .iter()
        .filter(|r| r.get(field).and_then(Value::as_key).is_some_and(|k| k == month))
        .cloned()
        .collect()
}

/// The most recent well-formed month in the sheet.
pub fn latest_month(records: &[Record], config: &AggregatorConfig) -> Option<Month> {
    let field = config.yields.month_field.as_str();
    records
        .iter()
        .filter_map(|r| r.get(field).and_then(Value::as_key))
        .filter_map(|k| Month::parse(&k))
        .max()
}

/// One row per production area for a month (the latest when `month` is
/// `None`): each product line's yield under the product name and its target
/// under `{product}_目標`. Areas keep first-seen order; a repeated
/// area/product pair overwrites the earlier values.
pub fn group_by_area_and_product(
    records: &[Record],
    month: Option<&str>,
    config: &AggregatorConfig,
) -> Vec<Record> {
    let y = &config.yields;
    let target = match month.filter(|m| !m.is_empty()) {
        Some(m) => m.to_string(),
        None => match latest_month(records, config) {
            Some(m) => m.to_string(),
            None => return Vec::new(),
        },
    };

    let mut areas: Vec<Record> = Vec::new();
    for r in filter_by_month(records, Some(target.as_str()), config) {
        let area = r.get(&y.area_field).cloned().unwrap_or_default();
        let product = r.get(&y.product_field).map(|v| v.to_string()).unwrap_or_default();

        let found = areas.iter().position(|a| a.get(&y.area_field) == Some(&area));
        let idx = match found {
            Some(i) => i,
            None => {
                areas.push(Record::new().with(y.area_field.as_str(), area));
                areas.len() - 1
            }
        };
        let row = &mut areas[idx];
        row.set(
            format!("{}{}", product, y.target_suffix),
            r.get(&y.target_field).cloned().unwrap_or_default(),
        );
        row.set(product, r.get(&y.yield_field).cloned().unwrap_or_default());
    }
    areas
}

/// Average, min and max yield (2 decimals) and the share of rows meeting
/// their target (1 decimal). A missing yield counts as 0; a row without a
/// numeric target never meets it. Empty input yields all zeros.
pub fn yield_stats(records: &[Record], config: &AggregatorConfig) -> YieldStats {
    if records.is_empty() {
        return YieldStats::default();
    }
    let y = &config.yields;
    let number = |r: &Record, field: &str| r.get(field).and_then(Value::as_number);

    let yields: Vec<f64> = records
        .iter()
        .map(|r| number(r, y.yield_field.as_str()).unwrap_or(0.0))
        .collect();
    let min = yields.iter().copied().fold(f64::INFINITY, f64::min);
    let max = yields.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let achieved = records
        .iter()
        .filter(|r| {
            match (number(r, y.yield_field.as_str()), number(r, y.target_field.as_str())) {
                (Some(actual), Some(target)) => actual >= target,
                _ => false,
            }
        })
        .count();

    YieldStats {
        avg_yield: round_to(average(&yields), 2),
        min_yield: round_to(min, 2),
        max_yield: round_to(max, 2),
        target_achievement_rate: round_to(achieved as f64 / records.len() as f64 * 100.0, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yield_row(month: &str, area: &str, product: &str, rate: f64, target: f64) -> Record {
        Record::new()
            .with("月份", month)
            .with("生產區域", area)
            .with("產品線", product)
            .with("良率", rate)
            .with("目標良率", target)
    }

    fn sheet() -> Vec<Record> {
        vec![
            yield_row("2025-09", "A區", "5nm", 91.0, 92.0),
            yield_row("2025-10", "A區", "5nm", 93.5, 92.0),
            yield_row("2025-10", "A區", "7nm", 95.2, 95.0),
            yield_row("2025-10", "B區", "5nm", 90.1, 92.0),
            yield_row("2024-12", "B區", "7nm", 94.0, 95.0),
        ]
    }

    #[test]
    fn month_filter_matches_exact_keys() {
        let config = AggregatorConfig::default();
        assert_eq!(filter_by_month(&sheet(), Some("2025-10"), &config).len(), 3);
        assert!(filter_by_month(&sheet(), Some("2025-1"), &config).is_empty());
        assert_eq!(filter_by_month(&sheet(), None, &config).len(), 5);
        assert_eq!(filter_by_month(&sheet(), Some(""), &config).len(), 5);
    }

    #[test]
    fn latest_month_ignores_malformed_keys() {
        let config = AggregatorConfig::default();
        let mut records = sheet();
        records.push(yield_row("2099-13", "C區", "5nm", 1.0, 1.0));
        assert_eq!(latest_month(&records, &config), Month::new(2025, 10));
        assert_eq!(latest_month(&[], &config), None);
    }

    #[test]
    fn areas_pivot_products_for_the_latest_month() {
        let config = AggregatorConfig::default();
        let rows = group_by_area_and_product(&sheet(), None, &config);
        assert_eq!(rows.len(), 2);

        let a = &rows[0];
        assert_eq!(a.get("生產區域"), Some(&Value::from("A區")));
        assert_eq!(a.get("5nm"), Some(&Value::from(93.5)));
        assert_eq!(a.get("5nm_目標"), Some(&Value::from(92.0)));
        assert_eq!(a.get("7nm"), Some(&Value::from(95.2)));

        let b = &rows[1];
        assert_eq!(b.get("5nm"), Some(&Value::from(90.1)));
        assert!(!b.contains("7nm"));

        let older = group_by_area_and_product(&sheet(), Some("2024-12"), &config);
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].get("7nm"), Some(&Value::from(94.0)));
        assert!(group_by_area_and_product(&[], None, &config).is_empty());
    }

    #[test]
    fn yield_stats_count_rows_meeting_target() {
        let config = AggregatorConfig::default();
        let rows = filter_by_month(&sheet(), Some("2025-10"), &config);
        let stats = yield_stats(&rows, &config);
        // (93.5 + 95.2 + 90.1) / 3 = 92.933...
        assert_eq!(stats.avg_yield, 92.93);
        assert_eq!(stats.min_yield, 90.1);
        assert_eq!(stats.max_yield, 95.2);
        // 2 of 3 rows meet their target.
        assert_eq!(stats.target_achievement_rate, 66.7);
    }

    #[test]
    fn missing_yields_count_as_zero_and_empty_input_is_zero() {
        let config = AggregatorConfig::default();
        let rows = vec![
            yield_row("2025-10", "A區", "5nm", 90.0, 80.0),
            Record::new().with("月份", "2025-10").with("目標良率", 80.0),
        ];
        let stats = yield_stats(&rows, &config);
        assert_eq!(stats.avg_yield, 45.0);
        assert_eq!(stats.min_yield, 0.0);
        assert_eq!(stats.target_achievement_rate, 50.0);
        assert_eq!(yield_stats(&[], &config), YieldStats::default());
    }
}
