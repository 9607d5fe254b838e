//! Persisted form of a result store.
//!
//! Columns: `<variable>_cut` per variable, then per sample tag
//! `count_<tag>`, `fraction_<tag>`, `unweighted_<tag>`. Row order is
//! generation order. CSV is the default; `.parquet` paths go through polars.
//! Floats are written in shortest round-trip form so reruns are byte-identical.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use thiserror::Error;

use super::store::{ResultRow, ResultStore};
use crate::cuts::CutPoint;
use crate::data::loader::dataframe_to_columns;
use crate::data::TableFormat;
use crate::engine::SampleCounts;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot write results to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read results from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {reason}")]
    Format { path: String, reason: String },

    #[error("inconsistent result store: {0}")]
    Shape(String),
}

impl ResultStore {
    /// Write the store to `path` (CSV, or Parquet for `.parquet`).
    ///
    /// Parent directories are created as needed.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let display = path.display().to_string();
        let write_err = |source: std::io::Error| PersistError::Write {
            path: display.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        match TableFormat::from_path(path) {
            Some(TableFormat::Parquet) => {
                let mut df = self.to_dataframe().map_err(|e| PersistError::Format {
                    path: display.clone(),
                    reason: e.to_string(),
                })?;
                let tmp = path.with_extension("parquet.tmp");
                let file = fs::File::create(&tmp).map_err(write_err)?;
                ParquetWriter::new(file)
                    .finish(&mut df)
                    .map_err(|e| PersistError::Format {
                        path: display.clone(),
                        reason: format!("write parquet: {e}"),
                    })?;
                fs::rename(&tmp, path).map_err(|e| {
                    let _ = fs::remove_file(&tmp);
                    write_err(e)
                })?;
            }
            _ => {
                let csv = self.to_csv_string()?;
                fs::write(path, csv).map_err(write_err)?;
            }
        }
        Ok(())
    }

    /// Read a store written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let display = path.display().to_string();
        let format_err = |reason: String| PersistError::Format {
            path: display.clone(),
            reason,
        };

        let columns = match TableFormat::from_path(path) {
            Some(TableFormat::Parquet) => {
                let file = fs::File::open(path).map_err(|source| PersistError::Read {
                    path: display.clone(),
                    source,
                })?;
                let df = ParquetReader::new(file)
                    .finish()
                    .map_err(|e| format_err(format!("read parquet: {e}")))?;
                dataframe_to_columns(&df).map_err(|e| format_err(e.to_string()))?
            }
            _ => {
                let text = fs::read_to_string(path).map_err(|source| PersistError::Read {
                    path: display.clone(),
                    source,
                })?;
                read_csv_columns(&text).map_err(format_err)?
            }
        };

        Self::from_columns(columns).map_err(format_err)
    }

    /// Render the CSV form.
    pub fn to_csv_string(&self) -> Result<String, PersistError> {
        let shape = |e: csv::Error| PersistError::Shape(format!("csv: {e}"));
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(self.column_names()).map_err(shape)?;

        for row in self.rows() {
            let mut record: Vec<String> =
                row.cut_point.thresholds().iter().map(|t| t.to_string()).collect();
            for c in &row.counts {
                record.push(c.weighted.to_string());
                record.push(c.fraction.to_string());
                record.push(c.unweighted.to_string());
            }
            wtr.write_record(&record).map_err(shape)?;
        }

        let data = wtr
            .into_inner()
            .map_err(|e| PersistError::Shape(format!("csv flush: {e}")))?;
        String::from_utf8(data).map_err(|e| PersistError::Shape(e.to_string()))
    }

    fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns = Vec::new();
        for (v, name) in self.variables().iter().enumerate() {
            let values: Vec<f64> = self
                .rows()
                .iter()
                .map(|r| r.cut_point.thresholds()[v])
                .collect();
            columns.push(Column::new(format!("{name}_cut").into(), values));
        }
        for (t, tag) in self.tags().iter().enumerate() {
            let counts: Vec<&SampleCounts> = self.rows().iter().map(|r| &r.counts[t]).collect();
            columns.push(Column::new(
                format!("count_{tag}").into(),
                counts.iter().map(|c| c.weighted).collect::<Vec<f64>>(),
            ));
            columns.push(Column::new(
                format!("fraction_{tag}").into(),
                counts.iter().map(|c| c.fraction).collect::<Vec<f64>>(),
            ));
            columns.push(Column::new(
                format!("unweighted_{tag}").into(),
                counts.iter().map(|c| c.unweighted).collect::<Vec<u64>>(),
            ));
        }
        DataFrame::new(columns)
    }

    /// Rebuild a store from named columns.
    ///
    /// Variables are the leading `*_cut` columns. The sample block starts at
    /// the first `count_<tag>` column directly followed by `fraction_<tag>`;
    /// each tag then has `count_`, `fraction_` and an optional `unweighted_`
    /// column, in that order.
    fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self, String> {
        let starts_sample = |i: usize| {
            columns[i].0.strip_prefix("count_").is_some_and(|tag| {
                columns
                    .get(i + 1)
                    .is_some_and(|(next, _)| *next == format!("fraction_{tag}"))
            })
        };

        let mut i = 0;
        let mut variables: Vec<(String, &Vec<f64>)> = Vec::new();
        while i < columns.len() && !starts_sample(i) {
            let (name, values) = &columns[i];
            let var = name
                .strip_suffix("_cut")
                .ok_or_else(|| format!("unexpected column '{name}'"))?;
            variables.push((var.to_string(), values));
            i += 1;
        }
        if variables.is_empty() {
            return Err("no `<variable>_cut` columns".into());
        }

        let mut tags = Vec::new();
        let mut per_tag = Vec::new();
        while i < columns.len() {
            let (name, count) = &columns[i];
            let tag = name
                .strip_prefix("count_")
                .filter(|_| starts_sample(i))
                .ok_or_else(|| format!("unexpected column '{name}'"))?;
            let frac = &columns[i + 1].1;
            i += 2;
            let unweighted = match columns.get(i) {
                Some((n, u)) if *n == format!("unweighted_{tag}") => {
                    i += 1;
                    Some(u)
                }
                _ => None,
            };
            tags.push(tag.to_string());
            per_tag.push((count, frac, unweighted));
        }

        let len = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let rows = (0..len)
            .map(|i| ResultRow {
                cut_point: CutPoint::new(variables.iter().map(|(_, v)| v[i]).collect()),
                counts: per_tag
                    .iter()
                    .map(|(count, frac, unweighted)| SampleCounts {
                        unweighted: unweighted.map(|u| u[i] as u64).unwrap_or(0),
                        weighted: count[i],
                        fraction: frac[i],
                    })
                    .collect(),
            })
            .collect();

        ResultStore::new(
            variables.into_iter().map(|(n, _)| n).collect(),
            tags,
            rows,
        )
        .map_err(|e| e.to_string())
    }
}

fn read_csv_columns(text: &str) -> Result<Vec<(String, Vec<f64>)>, String> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| format!("header: {e}"))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| format!("row {row}: {e}"))?;
        for (col, field) in record.iter().enumerate() {
            let value = field
                .parse::<f64>()
                .map_err(|_| format!("row {row}, column '{}': '{field}'", headers[col]))?;
            columns[col].push(value);
        }
    }
    Ok(headers.into_iter().zip(columns).collect())
}
