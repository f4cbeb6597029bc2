//! Local CSV reader used instead of the hosted extraction integration.
//!
//! Cells are coerced using the same row schema the integration receives:
//! numbers, booleans, `;`-separated lists and JSON objects. Empty cells are
//! left out of the row.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Number, Value};

use super::ImportKind;
use crate::store::Record;

pub fn read_rows(path: &Path, kind: ImportKind) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed opening CSV {}", path.display()))?;
    parse_rows(file, kind).with_context(|| format!("Failed reading CSV {}", path.display()))
}

pub fn parse_rows<R: Read>(input: R, kind: ImportKind) -> Result<Vec<Record>> {
    let schema = kind.row_schema();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader.headers().context("Failed reading CSV headers")?.clone();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed reading CSV row {}", idx + 2))?;
        let mut row = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            if header.is_empty() || cell.is_empty() {
                continue;
            }
            let declared = properties
                .get(header)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str);
            if let Some(value) = coerce_cell(cell, declared) {
                row.insert(header.to_string(), value);
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn coerce_cell(cell: &str, declared: Option<&str>) -> Option<Value> {
    match declared {
        Some("number") => Some(parse_number(cell).unwrap_or_else(|| Value::String(cell.to_string()))),
        Some("boolean") => Some(
            parse_bool_flag(cell)
                .map(Value::Bool)
                .unwrap_or_else(|| Value::String(cell.to_string())),
        ),
        Some("array") => Some(Value::Array(
            cell.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        Some("object") => serde_json::from_str::<Value>(cell)
            .ok()
            .filter(Value::is_object),
        _ => Some(Value::String(cell.to_string())),
    }
}

/// `"49"` → `49`, `"180.50"` → `180.5`, `"£1,200"` → `1200`.
fn parse_number(cell: &str) -> Option<Value> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, '£' | ',' | ' '))
        .collect();
    let f = cleaned.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        Some(Value::Number(Number::from(f as i64)))
    } else {
        Number::from_f64(f).map(Value::Number)
    }
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
