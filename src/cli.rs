//! Command-line interface argument parsing.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Reshape dashboard sheets: year filters, quarter roll-ups, weekly totals
/// and Book-to-Bill offset windows.
///
/// Examples:
///   rust_dashboard --input 財務趨勢.csv --year all
///   rust_dashboard --input 生產排程.csv --mode weekly --field 產品線 --value 5nm
///   rust_dashboard --input 訂單出貨比.csv --mode matrix --output matrix.csv
///   rust_dashboard --input 機台健康度.csv --mode machine-types
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Sheet exported as CSV; the first row holds the field names
    #[arg(short, long, value_name = "FILE", required_unless_present = "print_config")]
    pub input: Option<PathBuf>,

    /// What to compute
    #[arg(short, long, value_enum, default_value = "year")]
    pub mode: Mode,

    /// Year selector: "all" or a year such as 2024
    #[arg(short, long, default_value = "all", env = "DASHBOARD_YEAR")]
    pub year: String,

    /// Dimension field to filter on before aggregating (e.g. 產品線)
    #[arg(long, value_name = "FIELD", requires = "value")]
    pub field: Option<String>,

    /// Value the dimension field must equal ("all" keeps every row)
    #[arg(long, value_name = "VALUE", requires = "field")]
    pub value: Option<String>,

    /// Month (YYYY-MM) for the yield modes; defaults to the latest month
    /// for yield-by-area
    #[arg(long, value_name = "YYYY-MM")]
    pub month: Option<String>,

    /// Period field holding the month for the matrix modes
    #[arg(long, default_value = "月份")]
    pub period_field: String,

    /// Order amount field for the matrix modes
    #[arg(long, default_value = "訂單金額(M NTD)")]
    pub orders_field: String,

    /// Shipment amount field for the matrix modes
    #[arg(long, default_value = "出貨金額(M NTD)")]
    pub shipments_field: String,

    /// Number of months in each offset window
    #[arg(long, value_name = "N")]
    pub offsets: Option<u32>,

    /// Write the result to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format for --output
    #[arg(long, value_enum, default_value = "csv")]
    pub format: OutputFormat,

    /// Rows shown in the terminal preview
    #[arg(long, default_value = "5", value_name = "ROWS")]
    pub preview: usize,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "DASHBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Filter by year; "all" rolls monthly data up to quarters
    Year,
    /// Only apply the --field/--value filter
    Dimension,
    /// Weekly production totals with achievement rate
    Weekly,
    /// Achievement statistics over the (filtered) rows
    Stats,
    /// Book-to-Bill heatmap, one row per base month
    Matrix,
    /// Book-to-Bill heatmap, one row per update date
    MatrixByDate,
    /// Average ratio per target month and update day
    RatioTrend,
    /// Yield per production area and product line for one month
    YieldByArea,
    /// Yield statistics over the (filtered) rows
    YieldStats,
    /// Machines below the health threshold, worst first
    HighRisk,
    /// Machines grouped by risk level
    RiskLevels,
    /// Health statistics per machine type
    MachineTypes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["rust_dashboard", "--input", "a.csv"]).unwrap();
        assert_eq!(args.mode, Mode::Year);
        assert_eq!(args.year, "all");
        assert_eq!(args.format, OutputFormat::Csv);
        assert_eq!(args.log_level(), Level::INFO);
    }

    #[test]
    fn modes_and_dimension_pair() {
        let args = Args::try_parse_from([
            "rust_dashboard",
            "-i",
            "s.csv",
            "--mode",
            "matrix-by-date",
            "--field",
            "產品線",
            "--value",
            "5nm",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.mode, Mode::MatrixByDate);
        assert_eq!(args.field.as_deref(), Some("產品線"));
        assert_eq!(args.log_level(), Level::DEBUG);

        assert!(Args::try_parse_from(["rust_dashboard", "-i", "s.csv", "--field", "x"]).is_err());
        assert!(Args::try_parse_from(["rust_dashboard", "-i", "s.csv", "-v", "-q"]).is_err());
    }

    #[test]
    fn yield_and_health_modes() {
        let args = Args::try_parse_from([
            "rust_dashboard",
            "-i",
            "yield.csv",
            "--mode",
            "yield-by-area",
            "--month",
            "2025-10",
        ])
        .unwrap();
        assert_eq!(args.mode, Mode::YieldByArea);
        assert_eq!(args.month.as_deref(), Some("2025-10"));

        let args = Args::try_parse_from(["rust_dashboard", "-i", "m.csv", "-m", "machine-types"]).unwrap();
        assert_eq!(args.mode, Mode::MachineTypes);
        assert!(args.month.is_none());
    }

    #[test]
    fn input_not_needed_for_print_config() {
        assert!(Args::try_parse_from(["rust_dashboard", "--print-config"]).is_ok());
        assert!(Args::try_parse_from(["rust_dashboard"]).is_err());
    }
}
