//! Event table sources: CSV and Parquet.
//!
//! `open(path, tree, weight_field)`:
//! - `path` ending in `.csv` → header row + numeric fields (csv crate)
//! - `path` ending in `.parquet` → numeric columns cast to f64 (polars)
//! - `path` is a directory → `{path}/{tree}.parquet`, else `{path}/{tree}.csv`
//!
//! The tree name becomes the table name so error messages point at the sample.

use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::table::{DataError, EventTable};

/// Supported on-disk table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Some(Self::Csv),
            Some("parquet") | Some("pq") => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// Open an event table.
pub fn open(path: &Path, tree: &str, weight_field: Option<&str>) -> Result<EventTable, DataError> {
    let file = resolve(path, tree)?;
    let format = TableFormat::from_path(&file).ok_or_else(|| DataError::UnsupportedFormat {
        path: file.display().to_string(),
    })?;

    let columns = match format {
        TableFormat::Csv => read_csv_columns(&file)?,
        TableFormat::Parquet => read_parquet_columns(&file)?,
    };

    let table = EventTable::from_columns(tree, columns, weight_field)?;
    debug!(
        path = %file.display(),
        entries = table.entries(),
        weight = table.weight_field().unwrap_or("<unit>"),
        "loaded event table"
    );
    Ok(table)
}

/// Number of entries in a table without keeping it around.
pub fn entries(path: &Path, tree: &str) -> Result<usize, DataError> {
    Ok(open(path, tree, None)?.entries())
}

fn resolve(path: &Path, tree: &str) -> Result<PathBuf, DataError> {
    if path.is_dir() {
        for ext in ["parquet", "csv"] {
            let candidate = path.join(format!("{tree}.{ext}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        return Err(DataError::Io {
            path: path.join(format!("{tree}.{{parquet,csv}}")).display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no table for tree"),
        });
    }
    if !path.exists() {
        return Err(DataError::Io {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }
    Ok(path.to_path_buf())
}

fn read_csv_columns(path: &Path) -> Result<Vec<(String, Vec<f64>)>, DataError> {
    let display = path.display().to_string();
    let malformed = |reason: String| DataError::Malformed {
        path: display.clone(),
        reason,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| malformed(format!("open: {e}")))?;

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| malformed(format!("header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| malformed(format!("row {row}: {e}")))?;
        for (col, field) in record.iter().enumerate() {
            let value = field.parse::<f64>().map_err(|_| {
                malformed(format!(
                    "row {row}, column '{}': '{field}' is not a number",
                    headers[col]
                ))
            })?;
            columns[col].push(value);
        }
    }

    Ok(headers.into_iter().zip(columns).collect())
}

fn read_parquet_columns(path: &Path) -> Result<Vec<(String, Vec<f64>)>, DataError> {
    let display = path.display().to_string();
    let map_err = |e: PolarsError| DataError::Malformed {
        path: display.clone(),
        reason: format!("parquet: {e}"),
    };

    let file = fs::File::open(path).map_err(|source| DataError::Io {
        path: display.clone(),
        source,
    })?;
    let df = ParquetReader::new(file).finish().map_err(map_err)?;
    dataframe_to_columns(&df).map_err(map_err)
}

/// Convert every numeric column of a DataFrame to f64. Non-numeric columns are skipped.
pub(crate) fn dataframe_to_columns(df: &DataFrame) -> PolarsResult<Vec<(String, Vec<f64>)>> {
    let mut out = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        if !is_numeric(column.dtype()) {
            continue;
        }
        let cast = column.cast(&DataType::Float64)?;
        let values: Vec<f64> = cast
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        out.push((column.name().to_string(), values));
    }
    Ok(out)
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Boolean
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
    )
}
