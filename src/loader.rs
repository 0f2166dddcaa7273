use crate::error::{DashboardError, Result};
use crate::types::{Record, Value};
use crate::util::parse_f64_safe;
use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub blank_rows: usize,
}

/// Load a sheet exported as CSV. The first row holds the field names, used
/// verbatim as record keys.
pub fn load_records(path: &Path) -> Result<(Vec<Record>, LoadReport)> {
    if !path.exists() {
        return Err(DashboardError::FileNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    let (records, report) = read_records(file)?;
    info!(
        path = %path.display(),
        loaded = report.loaded_rows,
        errors = report.parse_errors,
        "sheet loaded"
    );
    Ok((records, report))
}

pub fn read_records<R: Read>(reader: R) -> Result<(Vec<Record>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for result in rdr.records() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };
        if row.iter().all(|cell| cell.trim().is_empty()) {
            report.blank_rows += 1;
            continue;
        }

        // Short rows leave the trailing fields null; extra cells are dropped.
        let record: Record = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), parse_cell(row.get(i))))
            .collect();
        records.push(record);
    }

    report.loaded_rows = records.len();
    Ok((records, report))
}

/// Empty cells are null, numeric cells are numbers, everything else is text.
fn parse_cell(cell: Option<&str>) -> Value {
    let Some(raw) = cell.map(str::trim).filter(|s| !s.is_empty()) else {
        return Value::Null;
    };
    match parse_f64_safe(Some(raw)) {
        Some(n) => Value::Number(n),
        None => Value::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SHEET: &str = "\
月份,營收,毛利率,是否為預測,註解
2024-01,100,32.5,N,
2024-02,\"1,100\",33.1,N,新產品上市
,,,,
2024-03,120
";

    #[test]
    fn header_row_names_the_fields() {
        let (records, report) = read_records(SHEET.as_bytes()).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.blank_rows, 1);
        assert_eq!(report.loaded_rows, 3);

        let first = &records[0];
        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            vec!["月份", "營收", "毛利率", "是否為預測", "註解"]
        );
        assert_eq!(first.get("月份"), Some(&Value::from("2024-01")));
        assert_eq!(first.get("營收"), Some(&Value::from(100.0)));
        assert_eq!(first.get("註解"), Some(&Value::Null));

        assert_eq!(records[1].get("營收"), Some(&Value::from(1100.0)));
        assert_eq!(records[1].get("註解"), Some(&Value::from("新產品上市")));

        // Short row: missing cells are null.
        assert_eq!(records[2].get("毛利率"), Some(&Value::Null));
    }

    #[test]
    fn load_from_disk_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHEET.as_bytes()).unwrap();
        let (records, _) = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 3);

        let missing = Path::new("/definitely/not/here.csv");
        assert!(matches!(load_records(missing), Err(DashboardError::FileNotFound(_))));
    }
}
