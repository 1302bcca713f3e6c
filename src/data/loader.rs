use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, HealthDataset, RawRow};
use crate::category::{CategoryTable, OTHER_CATEGORY};

pub const COUNTRY_COLUMN: &str = "Country Name";
pub const INDICATOR_NAME_COLUMN: &str = "Indicator Name";
pub const INDICATOR_CODE_COLUMN: &str = "Indicator Code";
pub const YEAR_COLUMN: &str = "Year";
pub const VALUE_COLUMN: &str = "Value";

const REQUIRED_COLUMNS: [&str; 5] = [
    COUNTRY_COLUMN,
    INDICATOR_NAME_COLUMN,
    INDICATOR_CODE_COLUMN,
    YEAR_COLUMN,
    VALUE_COLUMN,
];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load raw indicator rows from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with the five required columns
/// * `.json`    – `[{ "Country Name": ..., "Year": 2001, "Value": 1.5, ... }, ...]`
/// * `.parquet` – one column per required field
pub fn load_file(path: &Path) -> Result<Vec<RawRow>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let rows = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Load, classify and index a file.
///
/// Unless `keep_other` is set, rows whose indicator is not in `table` are
/// dropped.
pub fn load_dataset(path: &Path, table: &CategoryTable, keep_other: bool) -> Result<HealthDataset> {
    let rows = load_file(path)?;
    let dataset = HealthDataset::from_records(table.classify_rows(rows));
    Ok(if keep_other {
        dataset
    } else {
        dataset.without_category(OTHER_CATEGORY)
    })
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one observation per row.
///
/// Rows whose first cell starts with `#` are HXL hashtag rows (as found in
/// HDX exports of World Bank data) and are skipped.
fn load_csv(path: &Path) -> Result<Vec<RawRow>> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    read_csv(reader)
}

fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<RawRow>> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut idx = [0usize; 5];
    for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))?;
    }
    let [country_idx, name_idx, code_idx, year_idx, value_idx] = idx;

    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        if record.get(0).is_some_and(|c| c.starts_with('#')) {
            log::debug!("Skipping tag row {row_no}");
            continue;
        }

        let year_text = record.get(year_idx).unwrap_or("");
        let year = parse_year(year_text)
            .with_context(|| format!("CSV row {row_no}: '{year_text}' is not a year"))?;

        rows.push(RawRow {
            country: record.get(country_idx).unwrap_or("").to_string(),
            indicator_name: record.get(name_idx).unwrap_or("").to_string(),
            indicator_code: record.get(code_idx).unwrap_or("").to_string(),
            year,
            value: guess_value_type(record.get(value_idx).unwrap_or("")),
        });
    }

    Ok(rows)
}

/// Integer years, also accepting integral floats such as `2001.0`.
fn parse_year(s: &str) -> Option<i32> {
    let s = s.trim();
    if let Ok(y) = s.parse::<i32>() {
        return Some(y);
    }
    let f = s.parse::<f64>().ok()?;
    (f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64).then_some(f as i32)
}

fn guess_value_type(s: &str) -> CellValue {
    let t = s.trim();
    if t.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = t.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = t.parse::<f64>() {
        return CellValue::Number(f);
    }
    CellValue::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   {
///     "Country Name": "Sri Lanka",
///     "Indicator Name": "Population, female",
///     "Indicator Code": "SP.POP.TOTL.FE.IN",
///     "Year": 2020,
///     "Value": 11234567
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<RawRow>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

fn parse_json(text: &str) -> Result<Vec<RawRow>> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        for name in REQUIRED_COLUMNS {
            if !obj.contains_key(name) {
                bail!("Row {i}: missing '{name}'");
            }
        }

        let text_field = |name: &str| match obj.get(name) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let year = match &obj[YEAR_COLUMN] {
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(|y| i32::try_from(y).ok())
                .or_else(|| n.as_f64().and_then(|f| parse_year(&f.to_string()))),
            JsonValue::String(s) => parse_year(s),
            _ => None,
        }
        .with_context(|| format!("Row {i}: invalid '{YEAR_COLUMN}'"))?;

        rows.push(RawRow {
            country: text_field(COUNTRY_COLUMN),
            indicator_name: text_field(INDICATOR_NAME_COLUMN),
            indicator_code: text_field(INDICATOR_CODE_COLUMN),
            year,
            value: json_to_cell(&obj[VALUE_COLUMN]),
        });
    }

    Ok(rows)
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Number(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of indicator observations.
///
/// Expected schema:
/// - `Country Name`, `Indicator Name`, `Indicator Code`: Utf8 or LargeUtf8
/// - `Year`: Int32, Int64 or integral Float64
/// - `Value`: Float64, Float32, Int64, Int32 or Utf8, nullable
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let mut cols = Vec::with_capacity(REQUIRED_COLUMNS.len());
        for name in REQUIRED_COLUMNS {
            let i = schema
                .index_of(name)
                .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))?;
            cols.push(batch.column(i).clone());
        }

        for row in 0..batch.num_rows() {
            let year = extract_year(&cols[3], row)
                .with_context(|| format!("Row {row}: failed to read '{YEAR_COLUMN}'"))?;

            rows.push(RawRow {
                country: extract_text(&cols[0], row),
                indicator_name: extract_text(&cols[1], row),
                indicator_code: extract_text(&cols[2], row),
                year,
                value: extract_cell(&cols[4], row),
            });
        }
    }

    Ok(rows)
}

// -- Parquet / Arrow helpers --

fn extract_text(col: &Arc<dyn Array>, row: usize) -> String {
    if col.is_null(row) {
        return String::new();
    }
    if let Some(s) = col.as_string_opt::<i32>() {
        s.value(row).to_string()
    } else if let Some(s) = col.as_string_opt::<i64>() {
        s.value(row).to_string()
    } else {
        String::new()
    }
}

fn extract_year(col: &Arc<dyn Array>, row: usize) -> Result<i32> {
    if col.is_null(row) {
        bail!("null year");
    }
    let year = match col.data_type() {
        DataType::Int32 => Some(col.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => i32::try_from(col.as_primitive::<Int64Type>().value(row)).ok(),
        DataType::Float64 => parse_year(&col.as_primitive::<Float64Type>().value(row).to_string()),
        DataType::Utf8 | DataType::LargeUtf8 => parse_year(&extract_text(col, row)),
        other => bail!("Expected an integer year column, got {other:?}"),
    };
    year.context("year out of range")
}

fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Float64 => CellValue::Number(col.as_primitive::<Float64Type>().value(row)),
        DataType::Float32 => {
            CellValue::Number(col.as_primitive::<Float32Type>().value(row) as f64)
        }
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Int32 => {
            CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64)
        }
        DataType::Utf8 | DataType::LargeUtf8 => CellValue::Text(extract_text(col, row)),
        other => CellValue::Text(format!("{other:?}")),
    }
}
