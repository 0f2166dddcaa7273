use crate::util::{format_plain, parse_f64_safe};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tabled::Tabled;

/// A single cell of a flat record.
///
/// Workbook-derived sheets are untyped, so a field can hold a number, a
/// string, a boolean flag, or nothing at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell, used for averaging.
    ///
    /// - Finite numbers pass through.
    /// - Numeric strings (`"12.5"`, `"1,200"`) are parsed.
    /// - `NaN`, infinities, booleans, free text and nulls yield `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => parse_f64_safe(Some(s.as_str())).filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// String form of a period key cell.
    ///
    /// Text is returned as-is; an integral number (a year typed into a
    /// spreadsheet cell) is rendered without decimals.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            _ => None,
        }
    }

    /// Forecast flags are either the literal `"Y"` or a boolean `true`.
    pub fn is_forecast_flag(&self) -> bool {
        match self {
            Value::Text(s) => s.trim() == "Y",
            Value::Bool(b) => *b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_plain(*n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One observation: an ordered mapping from field name to value.
///
/// Field order is insertion order so that downstream consumers see columns
/// in the same order the sheet header declared them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Insert or replace a field, keeping the original position on replace.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Production schedule achievement summary over a set of weekly rows.
#[derive(Debug, Serialize, Tabled, Clone, Default, PartialEq)]
pub struct AchievementStats {
    #[serde(rename = "AvgAchievement")]
    #[tabled(rename = "AvgAchievement")]
    pub avg_achievement: f64,
    #[serde(rename = "MinAchievement")]
    #[tabled(rename = "MinAchievement")]
    pub min_achievement: f64,
    #[serde(rename = "MaxAchievement")]
    #[tabled(rename = "MaxAchievement")]
    pub max_achievement: f64,
    #[serde(rename = "TotalPlanned")]
    #[tabled(rename = "TotalPlanned")]
    pub total_planned: f64,
    #[serde(rename = "TotalActual")]
    #[tabled(rename = "TotalActual")]
    pub total_actual: f64,
    #[serde(rename = "OverallAchievement")]
    #[tabled(rename = "OverallAchievement")]
    pub overall_achievement: f64,
}

/// Yield summary over a set of product/area rows.
#[derive(Debug, Serialize, Tabled, Clone, Default, PartialEq)]
pub struct YieldStats {
    #[serde(rename = "AvgYield")]
    #[tabled(rename = "AvgYield")]
    pub avg_yield: f64,
    #[serde(rename = "MinYield")]
    #[tabled(rename = "MinYield")]
    pub min_yield: f64,
    #[serde(rename = "MaxYield")]
    #[tabled(rename = "MaxYield")]
    pub max_yield: f64,
    /// Percentage of rows whose yield meets the target.
    #[serde(rename = "TargetAchievementRate")]
    #[tabled(rename = "TargetAchievementRate")]
    pub target_achievement_rate: f64,
}

/// Machine health per machine type.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct MachineTypeStats {
    #[serde(rename = "機台類型")]
    #[tabled(rename = "機台類型")]
    pub machine_type: String,
    #[serde(rename = "數量")]
    #[tabled(rename = "數量")]
    pub count: usize,
    #[serde(rename = "平均健康度")]
    #[tabled(rename = "平均健康度")]
    pub avg_health: f64,
    #[serde(rename = "高風險數量")]
    #[tabled(rename = "高風險數量")]
    pub high_risk_count: usize,
    #[serde(rename = "高風險比例")]
    #[tabled(rename = "高風險比例")]
    pub high_risk_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_view_accepts_numbers_and_numeric_text() {
        assert_eq!(Value::from(12.5).as_number(), Some(12.5));
        assert_eq!(Value::from("1,200").as_number(), Some(1200.0));
        assert_eq!(Value::from("n/a").as_number(), None);
        assert_eq!(Value::from(f64::NAN).as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
        assert_eq!(Value::from(true).as_number(), None);
    }

    #[test]
    fn integral_numbers_render_as_year_keys() {
        assert_eq!(Value::from(2024).as_key().as_deref(), Some("2024"));
        assert_eq!(Value::from(2024.5).as_key(), None);
        assert_eq!(Value::from("2024-W03").as_key().as_deref(), Some("2024-W03"));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut r = Record::new().with("a", 1).with("b", 2);
        r.set("a", "x");
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(r.get("a"), Some(&Value::from("x")));
    }

    #[test]
    fn record_serializes_as_ordered_json_object() {
        let r = Record::new()
            .with("月份", "2024-Q1")
            .with("營收", 110.0)
            .with("註解", Value::Null);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"月份":"2024-Q1","營收":110.0,"註解":null}"#);
    }
}
