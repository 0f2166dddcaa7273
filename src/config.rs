//! Aggregator configuration.
//!
//! Every field name and constant the aggregation relies on lives here so
//! tests and callers can vary them without touching the aggregation code.
//! A TOML file may override any subset; missing keys keep their defaults.

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregatorConfig {
    /// Field names shared by every dataset.
    #[serde(default)]
    pub fields: FieldConfig,

    /// Production schedule (weekly) settings.
    #[serde(default)]
    pub weekly: WeeklyConfig,

    /// Book-to-Bill offset window settings.
    #[serde(default)]
    pub matrix: MatrixConfig,

    /// Product yield sheet settings.
    #[serde(default)]
    pub yields: YieldConfig,

    /// Machine health sheet settings.
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldConfig {
    /// Candidate period-key fields, in priority order. The first field that
    /// is present and non-null on a record wins.
    #[serde(default = "default_period_fields")]
    pub period_fields: Vec<String>,

    /// Forecast flag field (`"Y"`/`"N"` or boolean).
    #[serde(default = "default_forecast_field")]
    pub forecast_field: String,

    /// Free-text annotation field.
    #[serde(default = "default_note_field")]
    pub note_field: String,

    /// Separator used when concatenating annotations in a roll-up.
    #[serde(default = "default_note_separator")]
    pub note_separator: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            period_fields: default_period_fields(),
            forecast_field: default_forecast_field(),
            note_field: default_note_field(),
            note_separator: default_note_separator(),
        }
    }
}

fn default_period_fields() -> Vec<String> {
    vec!["月份", "基準月份", "更新日期", "週次", "年份"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_forecast_field() -> String {
    "是否為預測".to_string()
}

fn default_note_field() -> String {
    "註解".to_string()
}

fn default_note_separator() -> String {
    "; ".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyConfig {
    #[serde(default = "default_week_field")]
    pub week_field: String,

    #[serde(default = "default_year_field")]
    pub year_field: String,

    #[serde(default = "default_week_number_field")]
    pub week_number_field: String,

    #[serde(default = "default_planned_field")]
    pub planned_field: String,

    #[serde(default = "default_actual_field")]
    pub actual_field: String,

    /// Output field for actual / planned, as a percentage.
    #[serde(default = "default_rate_field")]
    pub rate_field: String,

    /// Output field for actual - planned.
    #[serde(default = "default_variance_field")]
    pub variance_field: String,
}

impl Default for WeeklyConfig {
    fn default() -> Self {
        Self {
            week_field: default_week_field(),
            year_field: default_year_field(),
            week_number_field: default_week_number_field(),
            planned_field: default_planned_field(),
            actual_field: default_actual_field(),
            rate_field: default_rate_field(),
            variance_field: default_variance_field(),
        }
    }
}

fn default_week_field() -> String {
    "週次".to_string()
}

fn default_year_field() -> String {
    "年份".to_string()
}

fn default_week_number_field() -> String {
    "週數".to_string()
}

fn default_planned_field() -> String {
    "計畫產量".to_string()
}

fn default_actual_field() -> String {
    "實際產量".to_string()
}

fn default_rate_field() -> String {
    "達成率".to_string()
}

fn default_variance_field() -> String {
    "差異".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatrixConfig {
    /// Number of months ahead of the base period in one window.
    #[serde(default = "default_offsets")]
    pub offsets: u32,

    /// Reference shipment average used when the prior year has no data.
    #[serde(default = "default_fallback_shipment_average")]
    pub fallback_shipment_average: f64,

    /// Trailing months of a series treated as forecast when the data carries
    /// no explicit flags.
    #[serde(default = "default_forecast_trailing_months")]
    pub forecast_trailing_months: usize,

    /// Ratios above this are labelled strong.
    #[serde(default = "default_strong_threshold")]
    pub strong_threshold: f64,

    /// Ratios below this are labelled soft.
    #[serde(default = "default_soft_threshold")]
    pub soft_threshold: f64,

    #[serde(default = "default_strong_label")]
    pub strong_label: String,

    #[serde(default = "default_soft_label")]
    pub soft_label: String,

    /// Days of the month on which order snapshots are taken.
    #[serde(default = "default_update_days")]
    pub update_days: Vec<u32>,

    #[serde(default = "default_base_month_field")]
    pub base_month_field: String,

    #[serde(default = "default_update_date_field")]
    pub update_date_field: String,

    #[serde(default = "default_target_month_field")]
    pub target_month_field: String,

    #[serde(default = "default_shipment_field")]
    pub shipment_field: String,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            offsets: default_offsets(),
            fallback_shipment_average: default_fallback_shipment_average(),
            forecast_trailing_months: default_forecast_trailing_months(),
            strong_threshold: default_strong_threshold(),
            soft_threshold: default_soft_threshold(),
            strong_label: default_strong_label(),
            soft_label: default_soft_label(),
            update_days: default_update_days(),
            base_month_field: default_base_month_field(),
            update_date_field: default_update_date_field(),
            target_month_field: default_target_month_field(),
            shipment_field: default_shipment_field(),
        }
    }
}

fn default_offsets() -> u32 {
    6
}

fn default_fallback_shipment_average() -> f64 {
    700.0
}

fn default_forecast_trailing_months() -> usize {
    3
}

fn default_strong_threshold() -> f64 {
    1.2
}

fn default_soft_threshold() -> f64 {
    0.9
}

fn default_strong_label() -> String {
    "訂單強勁".to_string()
}

fn default_soft_label() -> String {
    "訂單趨緩".to_string()
}

fn default_update_days() -> Vec<u32> {
    vec![1, 10, 20]
}

fn default_base_month_field() -> String {
    "基準月份".to_string()
}

fn default_update_date_field() -> String {
    "更新日期".to_string()
}

fn default_target_month_field() -> String {
    "目標月份".to_string()
}

fn default_shipment_field() -> String {
    "出貨金額".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YieldConfig {
    #[serde(default = "default_yield_month_field")]
    pub month_field: String,

    #[serde(default = "default_area_field")]
    pub area_field: String,

    #[serde(default = "default_product_field")]
    pub product_field: String,

    #[serde(default = "default_yield_field")]
    pub yield_field: String,

    #[serde(default = "default_target_yield_field")]
    pub target_field: String,

    /// Suffix of the per-product target column in the area pivot.
    #[serde(default = "default_target_suffix")]
    pub target_suffix: String,
}

impl Default for YieldConfig {
    fn default() -> Self {
        Self {
            month_field: default_yield_month_field(),
            area_field: default_area_field(),
            product_field: default_product_field(),
            yield_field: default_yield_field(),
            target_field: default_target_yield_field(),
            target_suffix: default_target_suffix(),
        }
    }
}

fn default_yield_month_field() -> String {
    "月份".to_string()
}

fn default_area_field() -> String {
    "生產區域".to_string()
}

fn default_product_field() -> String {
    "產品線".to_string()
}

fn default_yield_field() -> String {
    "良率".to_string()
}

fn default_target_yield_field() -> String {
    "目標良率".to_string()
}

fn default_target_suffix() -> String {
    "_目標".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthConfig {
    #[serde(default = "default_health_field")]
    pub health_field: String,

    #[serde(default = "default_risk_level_field")]
    pub risk_level_field: String,

    #[serde(default = "default_machine_type_field")]
    pub machine_type_field: String,

    /// Machines scoring below this are high risk.
    #[serde(default = "default_high_risk_threshold")]
    pub high_risk_threshold: f64,

    /// Risk levels in display order, most severe first.
    #[serde(default = "default_risk_levels")]
    pub risk_levels: Vec<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            health_field: default_health_field(),
            risk_level_field: default_risk_level_field(),
            machine_type_field: default_machine_type_field(),
            high_risk_threshold: default_high_risk_threshold(),
            risk_levels: default_risk_levels(),
        }
    }
}

fn default_health_field() -> String {
    "健康度".to_string()
}

fn default_risk_level_field() -> String {
    "風險等級".to_string()
}

fn default_machine_type_field() -> String {
    "機台類型".to_string()
}

fn default_high_risk_threshold() -> f64 {
    85.0
}

fn default_risk_levels() -> Vec<String> {
    vec!["極高風險", "高風險", "中風險", "低風險"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl AggregatorConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DashboardError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| DashboardError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render the defaults as TOML, for `--print-config`.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&AggregatorConfig::default()).unwrap_or_default()
    }
}
