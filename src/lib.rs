//! Time-series reshaping for metric dashboards.
//!
//! Sheets arrive as flat records (one per period and optional dimension).
//! This crate filters them by year, rolls monthly rows up to quarters,
//! totals production weeks, summarises yield and machine health sheets and
//! builds Book-to-Bill offset windows. Every aggregation is a pure function
//! from a record slice to a new `Vec`.

pub mod config;
pub mod error;
pub mod filter;
pub mod health;
pub mod loader;
pub mod matrix;
pub mod output;
pub mod period;
pub mod rollup;
pub mod types;
pub mod util;
pub mod weekly;
pub mod yields;

pub use config::AggregatorConfig;
pub use error::{DashboardError, Result};
pub use filter::{filter_by_dimension, filter_by_year, YearSelector};
pub use rollup::aggregate_to_quarters;
pub use types::{Record, Value};
