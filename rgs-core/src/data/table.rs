//! Immutable, weighted columnar event table.

use std::collections::HashMap;
use std::ops::Range;
use thiserror::Error;

/// Errors from table construction, loading, and column binding.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("table '{table}': column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumn {
        table: String,
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("table '{table}': duplicate column '{column}'")]
    DuplicateColumn { table: String, column: String },

    #[error("table '{table}', row {row}: weight {weight} is not a finite non-negative number")]
    InvalidWeight {
        table: String,
        row: usize,
        weight: f64,
    },

    #[error("table '{table}': rows {start}..{end} out of bounds ({len} entries)")]
    RowRange {
        table: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: unsupported table format (expected .csv or .parquet)")]
    UnsupportedFormat { path: String },

    #[error("{path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// One event: a borrowed view of a table row.
#[derive(Debug, Clone, Copy)]
pub struct EventRecord<'a> {
    table: &'a EventTable,
    row: usize,
}

impl EventRecord<'_> {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn weight(&self) -> f64 {
        self.table.weights[self.row]
    }

    pub fn value(&self, column: usize) -> f64 {
        self.table.value(self.row, column)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.table.index.get(name).map(|&c| self.value(c))
    }
}

/// Weighted columnar store of one sample's events.
///
/// Values are kept column-major; each event carries a non-negative weight
/// taken from the designated weight column (or 1.0 when there is none).
#[derive(Debug, Clone)]
pub struct EventTable {
    name: String,
    column_names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
    weights: Vec<f64>,
    weight_field: Option<String>,
}

impl EventTable {
    /// Build a table from named columns.
    ///
    /// If `weight_field` names one of the columns, its values become the
    /// event weights (and the column stays readable like any other).
    /// If it is `None` or absent from the columns, every event weighs 1.0.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<(String, Vec<f64>)>,
        weight_field: Option<&str>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        let len = columns.first().map(|(_, v)| v.len()).unwrap_or(0);

        let mut index = HashMap::with_capacity(columns.len());
        let mut column_names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());

        for (i, (col, values)) in columns.into_iter().enumerate() {
            if values.len() != len {
                return Err(DataError::RaggedColumn {
                    table: name,
                    column: col,
                    expected: len,
                    actual: values.len(),
                });
            }
            if index.insert(col.clone(), i).is_some() {
                return Err(DataError::DuplicateColumn {
                    table: name,
                    column: col,
                });
            }
            column_names.push(col);
            data.push(values);
        }

        let weight_col = weight_field.and_then(|w| index.get(w).copied());
        let weights = match weight_col {
            Some(c) => {
                let weights = data[c].clone();
                if let Some((row, &weight)) = weights
                    .iter()
                    .enumerate()
                    .find(|(_, w)| !w.is_finite() || **w < 0.0)
                {
                    return Err(DataError::InvalidWeight {
                        table: name,
                        row,
                        weight,
                    });
                }
                weights
            }
            None => vec![1.0; len],
        };

        Ok(Self {
            name,
            column_names,
            index,
            columns: data,
            weights,
            weight_field: weight_col.and(weight_field).map(str::to_string),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Number of events (ntuple-style alias of [`len`](Self::len)).
    pub fn entries(&self) -> usize {
        self.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Weight column actually used, if any.
    pub fn weight_field(&self) -> Option<&str> {
        self.weight_field.as_deref()
    }

    /// Resolve a column name to its index.
    pub fn column_index(&self, column: &str) -> Result<usize, DataError> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| DataError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn column(&self, column: usize) -> &[f64] {
        &self.columns[column]
    }

    #[inline]
    pub fn value(&self, row: usize, column: usize) -> f64 {
        self.columns[column][row]
    }

    #[inline]
    pub fn weight(&self, row: usize) -> f64 {
        self.weights[row]
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn record(&self, row: usize) -> EventRecord<'_> {
        EventRecord { table: self, row }
    }

    pub fn records(&self) -> impl Iterator<Item = EventRecord<'_>> {
        (0..self.len()).map(move |row| self.record(row))
    }

    /// Clamp `start..start + num_rows` to the table, failing if `start` is past the end.
    ///
    /// `num_rows == None` means "to the end of the table".
    pub fn row_range(&self, start: usize, num_rows: Option<usize>) -> Result<Range<usize>, DataError> {
        let len = self.len();
        if start > len {
            return Err(DataError::RowRange {
                table: self.name.clone(),
                start,
                end: start.saturating_add(num_rows.unwrap_or(0)),
                len,
            });
        }
        let end = match num_rows {
            Some(n) => start.saturating_add(n).min(len),
            None => len,
        };
        Ok(start..end)
    }
}
