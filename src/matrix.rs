//! Book-to-Bill offset windows.
//!
//! For a base month, look `offsets` months ahead and compare each month's
//! order amount with the prior year's average monthly shipment. A window
//! that would run past the last known month is not computable and yields
//! `None`; callers skip that base period.

use crate::config::{AggregatorConfig, MatrixConfig};
use crate::filter::YearSelector;
use crate::period::{leading_year, Month, PeriodKey};
use crate::types::{Record, Value};
use crate::util::{mean, round_to};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Month-indexed amounts (orders or shipments).
pub type AmountTable = BTreeMap<Month, f64>;

/// One target month of a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixCell {
    pub offset: u32,
    pub target_period: Month,
    pub order_amount: Option<f64>,
    /// Reference shipment average the ratio is computed against.
    pub shipment_amount: f64,
    /// Actual shipment of the target month, when known.
    pub target_shipment: Option<f64>,
    pub ratio: Option<f64>,
    pub is_forecast: bool,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum MatrixBase {
    Month(Month),
    Date(NaiveDate),
}

impl MatrixBase {
    pub fn month(&self) -> Month {
        match self {
            MatrixBase::Month(m) => *m,
            MatrixBase::Date(d) => Month::from_date(*d),
        }
    }

    pub fn key(&self) -> String {
        match self {
            MatrixBase::Month(m) => m.to_string(),
            MatrixBase::Date(d) => PeriodKey::Date(*d).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixWindow {
    pub base: MatrixBase,
    pub cells: Vec<MatrixCell>,
}

/// Mean of the prior calendar year's monthly shipments, rounded to a whole
/// amount. Months with no shipment (zero) do not count. Falls back to the
/// configured bootstrap value when the prior year has no data.
pub fn reference_shipment_average(base: Month, shipments: &AmountTable, config: &MatrixConfig) -> f64 {
    let prev = base.year - 1;
    let values: Vec<f64> = shipments
        .range(Month { year: prev, month: 1 }..=Month { year: prev, month: 12 })
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite() && *v != 0.0)
        .collect();
    mean(&values)
        .map(f64::round)
        .unwrap_or(config.fallback_shipment_average)
}

/// Build the window of `config.offsets` cells following `base`.
///
/// The known range is the span of the order table. Returns `None` when the
/// base lies outside it or `base + offsets` runs past its last month.
pub fn build_window(
    base: Month,
    orders: &AmountTable,
    shipments: &AmountTable,
    forecast: &BTreeSet<Month>,
    config: &MatrixConfig,
) -> Option<Vec<MatrixCell>> {
    let first = *orders.keys().next()?;
    let last = *orders.keys().next_back()?;
    if base < first || base > last || base.advance(config.offsets) > last {
        return None;
    }

    let reference = reference_shipment_average(base, shipments, config);
    let cells = (1..=config.offsets)
        .map(|offset| {
            let target = base.advance(offset);
            let order_amount = orders.get(&target).copied();
            let raw_ratio = order_amount.map(|o| if reference > 0.0 { o / reference } else { 0.0 });
            MatrixCell {
                offset,
                target_period: target,
                order_amount,
                shipment_amount: reference,
                target_shipment: shipments.get(&target).copied(),
                ratio: raw_ratio.map(|r| round_to(r, 2)),
                is_forecast: forecast.contains(&target),
                note: raw_ratio.map(|r| ratio_note(r, config)).unwrap_or_default(),
            }
        })
        .collect();
    Some(cells)
}

/// Date-resolution variant: the window of an update date is the window of
/// the month it falls in, tagged with the date.
pub fn build_window_by_date(
    base: NaiveDate,
    orders: &AmountTable,
    shipments: &AmountTable,
    forecast: &BTreeSet<Month>,
    config: &MatrixConfig,
) -> Option<MatrixWindow> {
    let cells = build_window(Month::from_date(base), orders, shipments, forecast, config)?;
    Some(MatrixWindow {
        base: MatrixBase::Date(base),
        cells,
    })
}

/// Every computable window over the order table's range, one per month.
pub fn build_matrix(
    orders: &AmountTable,
    shipments: &AmountTable,
    forecast: &BTreeSet<Month>,
    config: &MatrixConfig,
) -> Vec<MatrixWindow> {
    let (Some(first), Some(last)) = (orders.keys().next(), orders.keys().next_back()) else {
        return Vec::new();
    };
    let mut windows = Vec::new();
    let mut base = *first;
    while base <= *last {
        match build_window(base, orders, shipments, forecast, config) {
            Some(cells) => windows.push(MatrixWindow {
                base: MatrixBase::Month(base),
                cells,
            }),
            None => debug!(base = %base, "window runs past the known range, skipped"),
        }
        base = base.advance(1);
    }
    windows
}

/// Every computable window for a list of update dates.
pub fn build_matrix_by_dates(
    dates: &[NaiveDate],
    orders: &AmountTable,
    shipments: &AmountTable,
    forecast: &BTreeSet<Month>,
    config: &MatrixConfig,
) -> Vec<MatrixWindow> {
    dates
        .iter()
        .filter_map(|d| build_window_by_date(*d, orders, shipments, forecast, config))
        .collect()
}

/// Snapshot dates (`update_days` of each month) across the order table's
/// range. Days that do not exist in a month are skipped.
pub fn update_dates(orders: &AmountTable, config: &MatrixConfig) -> Vec<NaiveDate> {
    let (Some(first), Some(last)) = (orders.keys().next(), orders.keys().next_back()) else {
        return Vec::new();
    };
    let mut dates = Vec::new();
    let mut m = *first;
    while m <= *last {
        for day in &config.update_days {
            if let Some(d) = NaiveDate::from_ymd_opt(m.year, m.month, *day) {
                dates.push(d);
            }
        }
        m = m.advance(1);
    }
    dates
}

/// Keep the windows whose base key starts with the selected year.
pub fn filter_windows_by_year(windows: Vec<MatrixWindow>, selector: &YearSelector) -> Vec<MatrixWindow> {
    match selector {
        YearSelector::All => windows,
        YearSelector::Year(year) => windows
            .into_iter()
            .filter(|w| leading_year(&w.base.key()) == Some(year.as_str()))
            .collect(),
    }
}

fn ratio_note(ratio: f64, config: &MatrixConfig) -> String {
    if ratio > config.strong_threshold {
        config.strong_label.clone()
    } else if ratio < config.soft_threshold {
        config.soft_label.clone()
    } else {
        String::new()
    }
}

/// Month-indexed table of one amount field. Rows sharing a month are summed;
/// rows with a malformed month or a non-numeric amount are skipped.
pub fn amount_table(records: &[Record], period_field: &str, amount_field: &str) -> AmountTable {
    let mut table = AmountTable::new();
    for r in records {
        let month = r
            .get(period_field)
            .and_then(Value::as_key)
            .and_then(|k| Month::parse(&k));
        let amount = r.get(amount_field).and_then(Value::as_number);
        if let (Some(month), Some(amount)) = (month, amount) {
            *table.entry(month).or_insert(0.0) += amount;
        }
    }
    table
}

/// Months flagged as forecast in the data.
pub fn forecast_months(records: &[Record], period_field: &str, config: &AggregatorConfig) -> BTreeSet<Month> {
    records
        .iter()
        .filter(|r| {
            r.get(&config.fields.forecast_field)
                .is_some_and(Value::is_forecast_flag)
        })
        .filter_map(|r| r.get(period_field).and_then(Value::as_key))
        .filter_map(|k| Month::parse(&k))
        .collect()
}

/// The last `n` months of a table.
pub fn trailing_months(table: &AmountTable, n: usize) -> BTreeSet<Month> {
    table.keys().rev().take(n).copied().collect()
}

/// Flatten windows into heatmap rows: the base key, then ratio, target,
/// order amount and actual shipment per offset, then the first non-empty
/// cell note.
pub fn matrix_to_records(windows: &[MatrixWindow], config: &AggregatorConfig) -> Vec<Record> {
    let m = &config.matrix;
    windows
        .iter()
        .map(|w| {
            let base_field = match w.base {
                MatrixBase::Month(_) => m.base_month_field.as_str(),
                MatrixBase::Date(_) => m.update_date_field.as_str(),
            };
            let mut r = Record::new().with(base_field, w.base.key());
            for c in &w.cells {
                r.set(format!("+{}月比值", c.offset), c.ratio);
                r.set(format!("+{}月目標", c.offset), c.target_period.to_string());
                r.set(format!("+{}月訂單金額", c.offset), c.order_amount.map(f64::round));
                r.set(
                    format!("+{}月出貨金額", c.offset),
                    c.target_shipment.unwrap_or(0.0),
                );
            }
            let note = w.cells.iter().map(|c| c.note.as_str()).find(|n| !n.is_empty());
            r.set(config.fields.note_field.as_str(), note.unwrap_or_default());
            r
        })
        .collect()
}

/// Average ratio per target month, update day and offset across dated
/// windows. One record per target month, ascending; combinations with no
/// windows are null.
pub fn average_ratios_by_update_day(windows: &[MatrixWindow], config: &AggregatorConfig) -> Vec<Record> {
    #[derive(Default)]
    struct Acc {
        shipment: Option<f64>,
        ratios: BTreeMap<(u32, u32), Vec<f64>>,
    }

    let m = &config.matrix;
    let mut days: BTreeSet<u32> = BTreeSet::new();
    let mut targets: BTreeMap<Month, Acc> = BTreeMap::new();
    for w in windows {
        let MatrixBase::Date(date) = w.base else {
            continue;
        };
        let day = date.day();
        days.insert(day);
        for c in &w.cells {
            let acc = targets.entry(c.target_period).or_default();
            if acc.shipment.is_none() {
                acc.shipment = c.target_shipment;
            }
            if let Some(ratio) = c.ratio {
                acc.ratios.entry((day, c.offset)).or_default().push(ratio);
            }
        }
    }

    targets
        .into_iter()
        .map(|(target, acc)| {
            let mut r = Record::new()
                .with(m.target_month_field.as_str(), target.to_string())
                .with(m.shipment_field.as_str(), acc.shipment);
            for offset in 1..=m.offsets {
                for day in &days {
                    let avg = acc
                        .ratios
                        .get(&(*day, offset))
                        .and_then(|v| mean(v))
                        .map(|a| round_to(a, 2));
                    r.set(format!("{:02}日+{}月比值", day, offset), avg);
                }
            }
            r
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(s: &str) -> Month {
        Month::parse(s).unwrap()
    }

    /// 48 months, 2022-01 through 2025-12.
    fn series(start: f64, step: f64) -> AmountTable {
        (0..48)
            .map(|i| (Month::new(2022, 1).unwrap().advance(i), start + step * i as f64))
            .collect()
    }

    #[test]
    fn last_period_and_near_end_bases_are_not_computable() {
        let config = MatrixConfig::default();
        let orders = series(800.0, 5.0);
        let shipments = series(750.0, 4.0);
        let forecast = BTreeSet::new();

        assert!(build_window(month("2025-12"), &orders, &shipments, &forecast, &config).is_none());
        // Within five months of the end.
        assert!(build_window(month("2025-07"), &orders, &shipments, &forecast, &config).is_none());
        // Exactly six months of headroom.
        let cells = build_window(month("2025-06"), &orders, &shipments, &forecast, &config).unwrap();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[5].target_period, month("2025-12"));
        // Outside the range entirely.
        assert!(build_window(month("2021-12"), &orders, &shipments, &forecast, &config).is_none());
    }

    #[test]
    fn matrix_skips_trailing_bases() {
        let config = MatrixConfig::default();
        let orders = series(800.0, 5.0);
        let shipments = series(750.0, 4.0);
        let windows = build_matrix(&orders, &shipments, &BTreeSet::new(), &config);
        assert_eq!(windows.len(), 42);
        assert_eq!(windows.last().unwrap().base, MatrixBase::Month(month("2025-06")));
    }

    #[test]
    fn first_year_uses_fallback_reference() {
        let config = MatrixConfig::default();
        let shipments = series(750.0, 4.0);
        assert_eq!(reference_shipment_average(month("2022-05"), &shipments, &config), 700.0);
        // 2022 shipments: 750, 754, ..., 794 -> mean 772.
        assert_eq!(reference_shipment_average(month("2023-05"), &shipments, &config), 772.0);
    }

    #[test]
    fn empty_shipment_months_do_not_dilute_the_reference() {
        let config = MatrixConfig::default();
        let mut shipments = AmountTable::new();
        shipments.insert(month("2023-01"), 800.0);
        shipments.insert(month("2023-02"), 0.0);
        shipments.insert(month("2023-03"), 900.0);
        assert_eq!(reference_shipment_average(month("2024-04"), &shipments, &config), 850.0);

        let mut idle = AmountTable::new();
        idle.insert(month("2023-06"), 0.0);
        assert_eq!(reference_shipment_average(month("2024-01"), &idle, &config), 700.0);
    }

    #[test]
    fn windows_are_selected_by_the_leading_year_of_their_base() {
        let config = MatrixConfig::default();
        let orders = series(800.0, 5.0);
        let shipments = series(750.0, 4.0);
        let windows = build_matrix(&orders, &shipments, &BTreeSet::new(), &config);

        let kept = filter_windows_by_year(windows.clone(), &"2024".into());
        assert_eq!(kept.len(), 12);
        assert!(kept.iter().all(|w| w.base.key().starts_with("2024-")));

        let dates = [NaiveDate::from_ymd_opt(2023, 3, 10).unwrap()];
        let dated = build_matrix_by_dates(&dates, &orders, &shipments, &BTreeSet::new(), &config);
        assert_eq!(filter_windows_by_year(dated.clone(), &"2023".into()).len(), 1);
        assert!(filter_windows_by_year(dated, &"23".into()).is_empty());

        assert_eq!(filter_windows_by_year(windows.clone(), &YearSelector::All), windows);
    }

    #[test]
    fn ratios_notes_and_forecast_flags() {
        let config = MatrixConfig::default();
        let base = month("2023-01");
        let mut orders = AmountTable::new();
        let values = [1000.0, 900.0, 600.0, 772.0, 1000.0, 500.0, 800.0];
        for (i, v) in values.iter().enumerate() {
            orders.insert(base.advance(i as u32), *v);
        }
        let shipments = series(750.0, 4.0);
        let forecast: BTreeSet<Month> = [month("2023-06"), month("2023-07")].into_iter().collect();

        let cells = build_window(base, &orders, &shipments, &forecast, &config).unwrap();
        let ratios: Vec<f64> = cells.iter().map(|c| c.ratio.unwrap()).collect();
        assert_eq!(ratios, vec![1.17, 0.78, 1.0, 1.3, 0.65, 1.04]);

        let notes: Vec<&str> = cells.iter().map(|c| c.note.as_str()).collect();
        assert_eq!(notes, vec!["", "訂單趨緩", "", "訂單強勁", "訂單趨緩", ""]);

        let flags: Vec<bool> = cells.iter().map(|c| c.is_forecast).collect();
        assert_eq!(flags, vec![false, false, false, false, true, true]);
        assert!(cells.iter().all(|c| c.shipment_amount == 772.0));
    }

    #[test]
    fn forecast_window_comes_from_data() {
        let config = AggregatorConfig::default();
        let records = vec![
            Record::new().with("月份", "2025-09").with("訂單金額", 1.0).with("是否為預測", "N"),
            Record::new().with("月份", "2025-10").with("訂單金額", 1.0).with("是否為預測", "Y"),
            Record::new().with("月份", "2025-11").with("訂單金額", 1.0).with("是否為預測", true),
        ];
        let flagged = forecast_months(&records, "月份", &config);
        assert_eq!(flagged, [month("2025-10"), month("2025-11")].into_iter().collect());

        let table = amount_table(&records, "月份", "訂單金額");
        assert_eq!(trailing_months(&table, 2), flagged);
    }

    #[test]
    fn amount_table_sums_dimensions_and_skips_bad_rows() {
        let records = vec![
            Record::new().with("月份", "2024-01").with("出貨金額", 10.0),
            Record::new().with("月份", "2024-01").with("出貨金額", "5"),
            Record::new().with("月份", "2024-1").with("出貨金額", 99.0),
            Record::new().with("月份", "2024-02").with("出貨金額", "n/a"),
        ];
        let table = amount_table(&records, "月份", "出貨金額");
        assert_eq!(table.len(), 1);
        assert_eq!(table[&month("2024-01")], 15.0);
    }

    #[test]
    fn heatmap_rows_follow_sheet_layout() {
        let config = AggregatorConfig::default();
        let orders = series(800.0, 5.0);
        let shipments = series(750.0, 4.0);
        let windows = build_matrix(&orders, &shipments, &BTreeSet::new(), &config.matrix);
        let rows = matrix_to_records(&windows[..1], &config);
        let row = &rows[0];

        let keys: Vec<&str> = row.keys().collect();
        assert_eq!(keys[0], "基準月份");
        assert_eq!(&keys[1..5], &["+1月比值", "+1月目標", "+1月訂單金額", "+1月出貨金額"]);
        assert_eq!(*keys.last().unwrap(), "註解");
        assert_eq!(row.len(), 1 + 6 * 4 + 1);

        assert_eq!(row.get("基準月份"), Some(&Value::from("2022-01")));
        assert_eq!(row.get("+1月目標"), Some(&Value::from("2022-02")));
        assert_eq!(row.get("+1月訂單金額"), Some(&Value::from(805.0)));
        assert_eq!(row.get("+1月出貨金額"), Some(&Value::from(754.0)));
        // 805 / 700 = 1.15
        assert_eq!(row.get("+1月比值"), Some(&Value::from(1.15)));
        // +2: 810 / 700 = 1.157..., +6: 830 / 700 = 1.185..., none strong.
        assert_eq!(row.get("註解"), Some(&Value::from("")));
    }

    #[test]
    fn dated_windows_average_per_day_and_offset() {
        let config = AggregatorConfig::default();
        let orders = series(800.0, 5.0);
        let shipments = series(750.0, 4.0);
        let dates = update_dates(&orders, &config.matrix);
        assert_eq!(dates.len(), 48 * 3);

        let windows = build_matrix_by_dates(&dates, &orders, &shipments, &BTreeSet::new(), &config.matrix);
        assert_eq!(windows.len(), 42 * 3);

        let rows = matrix_to_records(&windows[..1], &config);
        assert_eq!(rows[0].get("更新日期"), Some(&Value::from("2022-01-01")));

        let trend = average_ratios_by_update_day(&windows, &config);
        // Targets run from 2022-02 to 2025-12.
        assert_eq!(trend.len(), 47);
        let first = &trend[0];
        assert_eq!(first.get("目標月份"), Some(&Value::from("2022-02")));
        assert_eq!(first.get("出貨金額"), Some(&Value::from(754.0)));
        assert_eq!(first.get("01日+1月比值"), Some(&Value::from(1.15)));
        assert_eq!(first.get("20日+1月比值"), Some(&Value::from(1.15)));
        // 2022-02 is never two months after a base month in range.
        assert_eq!(first.get("10日+2月比值"), Some(&Value::Null));
    }

    #[test]
    fn month_bases_are_ignored_by_the_day_trend() {
        let config = AggregatorConfig::default();
        let orders = series(800.0, 5.0);
        let shipments = series(750.0, 4.0);
        let windows = build_matrix(&orders, &shipments, &BTreeSet::new(), &config.matrix);
        assert!(average_ratios_by_update_day(&windows, &config).is_empty());
        assert!(build_matrix(&AmountTable::new(), &shipments, &BTreeSet::new(), &config.matrix).is_empty());
    }
}
