// Entry point and high-level CLI flow.
//
// One invocation loads one sheet, applies one directive and prints a
// preview; `--output` also writes the full result as CSV or JSON.
mod cli;

use anyhow::{Context, Result};
use cli::{Args, Mode, OutputFormat};
use rust_dashboard::config::AggregatorConfig;
use rust_dashboard::filter::{filter_by_dimension, filter_by_year, YearSelector};
use rust_dashboard::matrix::{self, MatrixWindow};
use rust_dashboard::types::Record;
use rust_dashboard::{health, loader, output, util, weekly, yields};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let args = Args::parse_args();

    if args.print_config {
        print!("{}", AggregatorConfig::default_toml());
        return;
    }

    init_logging(&args);
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    // A second subscriber only happens in tests; ignore it.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_config(args: &Args) -> Result<AggregatorConfig> {
    let mut config = match &args.config {
        Some(path) => AggregatorConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => AggregatorConfig::default(),
    };
    if let Some(n) = args.offsets {
        config.matrix.offsets = n;
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let input = args.input.as_deref().context("--input is required")?;

    let (records, report) = loader::load_records(input)
        .with_context(|| format!("Failed to load file: {}", input.display()))?;
    println!(
        "Processing dataset... ({} rows loaded)",
        util::format_int(report.loaded_rows)
    );
    if report.parse_errors + report.blank_rows > 0 {
        println!(
            "Note: {} rows skipped ({} unreadable, {} blank).",
            util::format_int(report.parse_errors + report.blank_rows),
            util::format_int(report.parse_errors),
            util::format_int(report.blank_rows)
        );
    }
    println!();

    let records = match (&args.field, &args.value) {
        (Some(field), Some(value)) => {
            let kept = filter_by_dimension(&records, field, value);
            info!(field = %field, value = %value, kept = kept.len(), "dimension filter applied");
            kept
        }
        _ => records,
    };

    let result = match args.mode {
        Mode::Stats => return handle_stats(&args, &records, &config),
        Mode::YieldStats => return handle_yield_stats(&args, &records, &config),
        Mode::MachineTypes => return handle_machine_types(&args, &records, &config),
        Mode::Year => handle_year(&args, &records, &config),
        Mode::Dimension => records,
        Mode::Weekly => {
            let filtered = filter_by_year(&records, &YearSelector::from(args.year.as_str()), &config);
            weekly::aggregate_by_week(&filtered, &config)
        }
        Mode::Matrix | Mode::MatrixByDate | Mode::RatioTrend => handle_matrix(&args, &records, &config),
        Mode::YieldByArea => yields::group_by_area_and_product(&records, args.month.as_deref(), &config),
        Mode::HighRisk => health::high_risk_machines(&records, &config),
        Mode::RiskLevels => handle_risk_levels(&records, &config),
    };

    println!("Result: {} rows\n", util::format_int(result.len()));
    output::preview_records(&result, args.preview);

    if let Some(path) = &args.output {
        write_result(path, args.format, &result)?;
        println!("(Full table exported to {})\n", path.display());
    }
    Ok(())
}

fn handle_year(args: &Args, records: &[Record], config: &AggregatorConfig) -> Vec<Record> {
    let selector = YearSelector::from(args.year.as_str());
    let result = filter_by_year(records, &selector, config);
    info!(year = %selector, rows = result.len(), "year filter applied");
    result
}

fn handle_stats(args: &Args, records: &[Record], config: &AggregatorConfig) -> Result<()> {
    let selector = YearSelector::from(args.year.as_str());
    let filtered = match selector {
        // Weekly rows pass through for "all"; monthly rows are not
        // production schedules, so never roll them up here.
        YearSelector::All => records.to_vec(),
        _ => filter_by_year(records, &selector, config),
    };
    let stats = weekly::achievement_stats(&filtered, config);
    println!("Achievement Summary ({} rows, year: {})\n", filtered.len(), selector);
    output::preview_table_rows(std::slice::from_ref(&stats), 1);
    println!(
        "Planned {} / actual {} ({}%)\n",
        util::format_number(stats.total_planned, 0),
        util::format_number(stats.total_actual, 0),
        util::format_number(stats.overall_achievement, 1)
    );
    write_summary(args, std::slice::from_ref(&stats))
}

fn handle_yield_stats(args: &Args, records: &[Record], config: &AggregatorConfig) -> Result<()> {
    let selector = YearSelector::from(args.year.as_str());
    let filtered = match selector {
        YearSelector::All => records.to_vec(),
        _ => filter_by_year(records, &selector, config),
    };
    let filtered = yields::filter_by_month(&filtered, args.month.as_deref(), config);
    let stats = yields::yield_stats(&filtered, config);
    println!(
        "Yield Summary ({} rows, year: {}, month: {})\n",
        filtered.len(),
        selector,
        args.month.as_deref().unwrap_or("all")
    );
    output::preview_table_rows(std::slice::from_ref(&stats), 1);
    write_summary(args, std::slice::from_ref(&stats))
}

fn handle_machine_types(args: &Args, records: &[Record], config: &AggregatorConfig) -> Result<()> {
    let stats = health::machine_type_stats(records, config);
    println!("Machine Health by Type ({} types)\n", stats.len());
    output::preview_table_rows(&stats, args.preview);
    write_summary(args, &stats)
}

fn handle_risk_levels(records: &[Record], config: &AggregatorConfig) -> Vec<Record> {
    let groups = health::group_by_risk_level(records, config);
    for (level, machines) in &groups {
        println!("{}: {} machines", level, util::format_int(machines.len()));
    }
    println!();
    groups.into_iter().flat_map(|(_, machines)| machines).collect()
}

fn write_summary<T: Serialize>(args: &Args, rows: &[T]) -> Result<()> {
    let Some(path) = &args.output else {
        return Ok(());
    };
    let written = match args.format {
        OutputFormat::Csv => output::write_rows_csv(path, rows),
        OutputFormat::Json => output::write_json(path, rows),
    };
    written.with_context(|| format!("Failed to write {}", path.display()))?;
    println!("(Summary exported to {})\n", path.display());
    Ok(())
}

fn handle_matrix(args: &Args, records: &[Record], config: &AggregatorConfig) -> Vec<Record> {
    let orders = matrix::amount_table(records, &args.period_field, &args.orders_field);
    let shipments = matrix::amount_table(records, &args.period_field, &args.shipments_field);

    let mut forecast = matrix::forecast_months(records, &args.period_field, config);
    if forecast.is_empty() {
        forecast = matrix::trailing_months(&orders, config.matrix.forecast_trailing_months);
    }
    info!(
        months = orders.len(),
        forecast = forecast.len(),
        "order and shipment tables built"
    );

    let windows: Vec<MatrixWindow> = match args.mode {
        Mode::Matrix => matrix::build_matrix(&orders, &shipments, &forecast, &config.matrix),
        _ => {
            let dates = matrix::update_dates(&orders, &config.matrix);
            matrix::build_matrix_by_dates(&dates, &orders, &shipments, &forecast, &config.matrix)
        }
    };

    let windows = matrix::filter_windows_by_year(windows, &YearSelector::from(args.year.as_str()));

    match args.mode {
        Mode::RatioTrend => matrix::average_ratios_by_update_day(&windows, config),
        _ => matrix::matrix_to_records(&windows, config),
    }
}

fn write_result(path: &Path, format: OutputFormat, result: &[Record]) -> Result<()> {
    let written = match format {
        OutputFormat::Csv => output::write_csv(path, result),
        OutputFormat::Json => output::write_json(path, result),
    };
    written.with_context(|| format!("Failed to write {}", path.display()))
}
