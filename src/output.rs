use crate::error::Result;
use crate::types::Record;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// Union of field names across records, in first-seen order.
pub fn column_names(records: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for r in records {
        for k in r.keys() {
            if !names.iter().any(|n| n == k) {
                names.push(k.to_string());
            }
        }
    }
    names
}

pub fn write_csv(path: &Path, records: &[Record]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv_to(file, records)
}

/// Rows missing a column get an empty cell; nulls are empty too.
pub fn write_csv_to<W: Write>(writer: W, records: &[Record]) -> Result<()> {
    let columns = column_names(records);
    let mut wtr = csv::Writer::from_writer(writer);
    if columns.is_empty() {
        wtr.flush()?;
        return Ok(());
    }
    wtr.write_record(&columns)?;
    for r in records {
        wtr.write_record(columns.iter().map(|c| r.get(c).map(|v| v.to_string()).unwrap_or_default()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// CSV of typed rows, one serialized struct per line.
pub fn write_rows_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` records.
pub fn render_records(records: &[Record], max_rows: usize) -> Option<String> {
    let slice = &records[..records.len().min(max_rows)];
    if slice.is_empty() {
        return None;
    }
    let columns = column_names(slice);
    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for r in slice {
        builder.push_record(columns.iter().map(|c| r.get(c).map(|v| v.to_string()).unwrap_or_default()));
    }
    Some(builder.build().with(Style::markdown()).to_string())
}

pub fn preview_records(records: &[Record], max_rows: usize) {
    match render_records(records, max_rows) {
        Some(table_str) => println!("{}\n", table_str),
        None => println!("(no rows)\n"),
    }
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
