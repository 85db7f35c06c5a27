//! CSV / JSON rendering for HR data downloads.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ExportError::Format(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No data to export")]
    Empty,
    #[error("unsupported export format: {0}")]
    Format(String),
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Converts typed rows into JSON records, keeping field declaration order.
pub fn to_records<T: Serialize>(items: &[T]) -> Result<Vec<Value>, ExportError> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(ExportError::from))
        .collect()
}

pub fn render(records: &[Value], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(records),
        ExportFormat::Json => to_json(records),
    }
}

/// Header row comes from the first record's keys; later records missing a
/// key get an empty cell.
pub fn to_csv(records: &[Value]) -> Result<String, ExportError> {
    let first = records.first().ok_or(ExportError::Empty)?;
    let headers: Vec<&str> = first
        .as_object()
        .map(|o| o.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(headers.join(","));
    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|h| csv_cell(record.get(*h).unwrap_or(&Value::Null)))
            .collect();
        lines.push(row.join(","));
    }
    Ok(lines.join("\n"))
}

pub fn to_json(records: &[Value]) -> Result<String, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    Ok(serde_json::to_string_pretty(records)?)
}

/// `<base>-<YYYY-MM-DD>.<ext>`
pub fn export_filename(base: &str, format: ExportFormat, date: NaiveDate) -> String {
    format!("{}-{}.{}", base, date.format("%Y-%m-%d"), format.extension())
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        nested => quote(&nested.to_string()),
    }
}

fn quote(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
