//! The result table of a grid search: one row per cut-point.

use serde::{Deserialize, Serialize};

use super::persist::PersistError;
use crate::cuts::CutPoint;
use crate::engine::{SampleCounts, SampleTotals};

/// One cut-point with its counts on every sample (in sample tag order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub cut_point: CutPoint,
    pub counts: Vec<SampleCounts>,
}

/// Rows in cut-point generation order; the row index is a stable identifier.
///
/// All rows share the same variable ordering and the same sample tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultStore {
    variables: Vec<String>,
    tags: Vec<String>,
    /// Known when the store comes straight from the engine.
    totals: Option<Vec<SampleTotals>>,
    rows: Vec<ResultRow>,
}

impl ResultStore {
    /// Assemble a store, checking every row against the variable and tag lists.
    pub fn new(
        variables: Vec<String>,
        tags: Vec<String>,
        rows: Vec<ResultRow>,
    ) -> Result<Self, PersistError> {
        for (i, row) in rows.iter().enumerate() {
            if row.cut_point.len() != variables.len() || row.counts.len() != tags.len() {
                return Err(PersistError::Shape(format!(
                    "row {i} has {} thresholds and {} sample counts, expected {} and {}",
                    row.cut_point.len(),
                    row.counts.len(),
                    variables.len(),
                    tags.len()
                )));
            }
        }
        Ok(Self {
            variables,
            tags,
            totals: None,
            rows,
        })
    }

    pub(crate) fn from_engine(
        variables: Vec<String>,
        tags: Vec<String>,
        totals: Vec<SampleTotals>,
        rows: Vec<ResultRow>,
    ) -> Self {
        Self {
            variables,
            tags,
            totals: Some(totals),
            rows,
        }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Sample totals, in tag order, when produced by a run.
    pub fn totals(&self) -> Option<&[SampleTotals]> {
        self.totals.as_deref()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&ResultRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn tag_index(&self, tag: &str) -> Option<usize> {
        let tag = tag.trim_start_matches('_');
        self.tags.iter().position(|t| t == tag)
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    /// Counts of row `index` on the sample tagged `tag`.
    pub fn counts(&self, index: usize, tag: &str) -> Option<&SampleCounts> {
        let t = self.tag_index(tag)?;
        self.rows.get(index).map(|r| &r.counts[t])
    }

    /// Persisted column names, in file order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.iter().map(|v| format!("{v}_cut")).collect();
        for tag in &self.tags {
            names.push(format!("count_{tag}"));
            names.push(format!("fraction_{tag}"));
            names.push(format!("unweighted_{tag}"));
        }
        names
    }

    /// Read one cell by persisted column name (`x_cut`, `count_s`, `fraction_b`, ...).
    ///
    /// Names resolve by their position in [`Self::column_names`], so a
    /// variable called `count_j` is still read from `count_j_cut`.
    pub fn value(&self, index: usize, column: &str) -> Option<f64> {
        let row = self.rows.get(index)?;
        let pos = self.column_names().iter().position(|n| n == column)?;
        if let Some(threshold) = row.cut_point.thresholds().get(pos) {
            return Some(*threshold);
        }
        let k = pos - self.variables.len();
        let counts = &row.counts[k / 3];
        match k % 3 {
            0 => Some(counts.weighted),
            1 => Some(counts.fraction),
            _ => Some(counts.unweighted as f64),
        }
    }
}
