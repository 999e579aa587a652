use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, ReportDataset, ReportRecord};
use crate::config::ColumnNames;

/// Image extensions the resolver (and the `image` build) understands.
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a report dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – semicolon-delimited UTF-8 with a header row (pipeline default)
/// * `.json`    – `[{ "text": "...", "id": ..., ...meta }, ...]`
/// * `.parquet` – Utf8 text column plus scalar metadata columns
///
/// The text column is required. The image path column is optional; when
/// present its values are kept verbatim until [`resolve_image_paths`].
pub fn load_file(path: &Path, columns: &ColumnNames) -> Result<ReportDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => load_csv(path, columns),
        "json" => load_json(path, columns),
        "parquet" | "pq" => load_parquet(path, columns),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!(
        "Loaded {} reports from {} with columns {:?}",
        dataset.len(),
        path.display(),
        dataset.column_names
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path, columns: &ColumnNames) -> Result<ReportDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let text_idx = headers
        .iter()
        .position(|h| *h == columns.text)
        .with_context(|| format!("CSV missing '{}' column", columns.text))?;
    let path_idx = headers.iter().position(|h| *h == columns.path);

    let column_names: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != text_idx && Some(*i) != path_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let mut records = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;

        let mut record = ReportRecord::new(row.get(text_idx).unwrap_or(""));
        record.image_path = path_idx
            .and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        for (col_idx, value) in row.iter().enumerate() {
            if col_idx == text_idx || Some(col_idx) == path_idx {
                continue;
            }
            // Ids stay verbatim so zero-padded names still match file stems.
            let cell = if headers[col_idx] == columns.id {
                MetadataValue::String(value.trim().to_string())
            } else {
                guess_metadata_type(value)
            };
            record.metadata.insert(headers[col_idx].clone(), cell);
        }

        records.push(record);
    }

    Ok(ReportDataset::from_records(records, column_names))
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    let s = s.trim();
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`:
///
/// ```json
/// [
///   { "id": "CXR1", "text": "the heart is normal in size", "images_path": "CXR1.png" },
///   ...
/// ]
/// ```
fn load_json(path: &Path, columns: &ColumnNames) -> Result<ReportDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    let mut column_names: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let report = obj
            .get(&columns.text)
            .and_then(JsonValue::as_str)
            .with_context(|| format!("Row {i}: missing or non-string '{}'", columns.text))?;

        let mut record = ReportRecord::new(report);
        record.image_path = obj
            .get(&columns.path)
            .and_then(JsonValue::as_str)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        for (key, val) in obj {
            if *key == columns.text || *key == columns.path {
                continue;
            }
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
            record.metadata.insert(key.clone(), json_to_metadata(val));
        }

        records.push(record);
    }

    Ok(ReportDataset::from_records(records, column_names))
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`), Utf8 or LargeUtf8 strings.
fn load_parquet(path: &Path, columns: &ColumnNames) -> Result<ReportDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    let mut column_names: Vec<String> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let text_idx = schema
            .index_of(&columns.text)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{}' column", columns.text))?;
        let path_idx = schema.index_of(&columns.path).ok();

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != text_idx && Some(*i) != path_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();
        if column_names.is_empty() {
            column_names = meta_cols.iter().map(|(_, name)| name.clone()).collect();
        }

        let text_col = batch.column(text_idx);
        for row in 0..batch.num_rows() {
            let report = string_at(text_col, row)
                .with_context(|| format!("Row {row}: '{}' is null or not a string", columns.text))?;

            let mut record = ReportRecord::new(report);
            record.image_path = path_idx
                .and_then(|i| string_at(batch.column(i), row))
                .filter(|p| !p.is_empty())
                .map(PathBuf::from);

            for (col_idx, col_name) in &meta_cols {
                let value = extract_metadata_value(batch.column(*col_idx), row);
                record.metadata.insert(col_name.clone(), value);
            }

            records.push(record);
        }
    }

    Ok(ReportDataset::from_records(records, column_names))
}

// -- Parquet / Arrow helpers --

fn string_at(col: &ArrayRef, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    if let Some(s) = col.as_string_opt::<i32>() {
        return Some(s.value(row).to_string());
    }
    col.as_string_opt::<i64>().map(|s| s.value(row).to_string())
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &ArrayRef, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    let value = match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => string_at(col, row).map(MetadataValue::String),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| MetadataValue::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| MetadataValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| MetadataValue::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| MetadataValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| MetadataValue::Bool(a.value(row))),
        other => Some(MetadataValue::String(format!("{other:?}"))),
    };
    value.unwrap_or(MetadataValue::Null)
}

// ---------------------------------------------------------------------------
// Image path resolution
// ---------------------------------------------------------------------------

/// Outcome of [`resolve_image_paths`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveSummary {
    pub resolved: usize,
    pub missing: usize,
}

/// Point every record at an existing image file, dropping those without one.
///
/// * a path column value is used as-is when absolute, joined onto
///   `images_dir` when relative
/// * otherwise the record's id column is matched against image file stems
///   in `images_dir`
pub fn resolve_image_paths(
    dataset: &mut ReportDataset,
    images_dir: &Path,
    columns: &ColumnNames,
) -> Result<ResolveSummary> {
    let needs_index = dataset.records.iter().any(|r| r.image_path.is_none());
    let index = if needs_index {
        index_images(images_dir)?
    } else {
        BTreeMap::new()
    };

    let mut missing = 0usize;
    dataset.records.retain_mut(|record| {
        let candidate = match record.image_path.take() {
            Some(p) if p.is_absolute() => Some(p),
            Some(p) => Some(images_dir.join(p)),
            None => record
                .metadata
                .get(&columns.id)
                .and_then(MetadataValue::as_text)
                .and_then(|id| index.get(&id).cloned()),
        };
        match candidate.filter(|p| p.is_file()) {
            Some(p) => {
                record.image_path = Some(p);
                true
            }
            None => {
                missing += 1;
                false
            }
        }
    });

    if missing > 0 {
        log::warn!(
            "Dropped {missing} reports without an image in {}",
            images_dir.display()
        );
    }
    Ok(ResolveSummary {
        resolved: dataset.len(),
        missing,
    })
}

/// Map file stem → path for every supported image directly inside `dir`.
pub fn index_images(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("listing images in {}", dir.display()))?;

    let mut index = BTreeMap::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("listing images in {}", dir.display()))?
            .path();
        if !path.is_file() || !is_supported_image(&path) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            index.insert(stem.to_string(), path.clone());
        }
    }
    Ok(index)
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
