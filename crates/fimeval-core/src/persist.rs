//! Persistence of statistics records and regression reports.
//!
//! Stats tables are CSV (`statistic,value`), stats records are JSON objects in
//! emission order with `null` for undefined values.

use std::path::Path;

use crate::archive::fs::write_atomic;
use crate::error::{FimError, Result};
use crate::regression::RegressionReport;
use crate::statistics::{StatValue, StatisticsRecord};

pub const STATS_CSV_HEADER: &str = "statistic,value";

const STATS_CSV_COLUMNS: [&str; 2] = ["statistic", "value"];

/// Parse a stats-table cell back into a value.
pub fn parse_cell(cell: &str) -> Option<StatValue> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(StatValue::Undefined);
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Some(StatValue::Integer(i));
    }
    cell.parse::<f64>().ok().map(StatValue::real)
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| FimError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| FimError::Parse {
        source_name: "csv writer".to_string(),
        detail: e.to_string(),
    })
}

pub fn stats_to_csv(record: &StatisticsRecord) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(STATS_CSV_COLUMNS)?;
    for (name, value) in record.iter() {
        writer.write_record([name, value.to_cell().as_str()])?;
    }
    into_string(writer)
}

pub fn stats_from_csv(source_name: &str, content: &str) -> Result<StatisticsRecord> {
    let parse_err = |line_no: u64, detail: String| FimError::Parse {
        source_name: source_name.to_string(),
        detail: format!("line {line_no}: {detail}"),
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let header = reader.headers()?;
    if header.is_empty() {
        return Err(parse_err(1, "empty stats table".to_string()));
    }
    if header.iter().ne(STATS_CSV_COLUMNS) {
        return Err(parse_err(
            1,
            format!("unexpected header '{}'", header.iter().collect::<Vec<_>>().join(",")),
        ));
    }

    let mut record = StatisticsRecord::new();
    for row in reader.records() {
        let row = row?;
        let line_no = row.position().map_or(0, |p| p.line());
        let (Some(name), Some(cell)) = (row.get(0), row.get(1)) else {
            return Err(parse_err(line_no, "expected two fields".to_string()));
        };
        let value =
            parse_cell(cell).ok_or_else(|| parse_err(line_no, format!("invalid value '{cell}'")))?;
        record.insert(name, value);
    }
    Ok(record)
}

pub fn stats_to_json(record: &StatisticsRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

pub fn stats_from_json(content: &str) -> Result<StatisticsRecord> {
    Ok(serde_json::from_str(content)?)
}

pub fn write_stats_csv(path: &Path, record: &StatisticsRecord) -> Result<()> {
    write_atomic(path, stats_to_csv(record)?.as_bytes())
}

pub fn read_stats_csv(path: &Path) -> Result<StatisticsRecord> {
    let content = read_artifact(path, "stats table")?;
    stats_from_csv(&path.display().to_string(), &content)
}

pub fn write_stats_json(path: &Path, record: &StatisticsRecord) -> Result<()> {
    write_atomic(path, stats_to_json(record)?.as_bytes())
}

pub fn read_stats_json(path: &Path) -> Result<StatisticsRecord> {
    stats_from_json(&read_artifact(path, "stats record")?)
}

/// Render a regression report: one row per statistic, one column per version
/// then one per diff.
pub fn regression_report_to_csv(report: &RegressionReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["statistic".to_string()];
    header.extend(report.columns());
    writer.write_record(&header)?;

    for statistic in &report.statistics {
        let mut row = vec![statistic.clone()];
        row.extend(report.row(statistic).iter().map(StatValue::to_cell));
        writer.write_record(&row)?;
    }
    into_string(writer)
}

pub fn write_regression_report(path: &Path, report: &RegressionReport) -> Result<()> {
    write_atomic(path, regression_report_to_csv(report)?.as_bytes())
}

fn read_artifact(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FimError::missing(path.display().to_string(), what)
        } else {
            FimError::Io(e)
        }
    })
}
