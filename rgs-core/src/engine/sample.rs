//! Sample registrations and their packed, column-resolved form.

use std::sync::Arc;

use super::counts::{SampleCounts, SampleTotals};
use crate::cuts::{CutDirection, CutPoint, CutSpec, Selection};
use crate::data::{DataError, EventTable};

/// A weighted sample registered with the engine.
#[derive(Debug, Clone)]
pub struct Sample {
    pub table: Arc<EventTable>,
    pub start_row: usize,
    /// `None` = to the end of the table.
    pub num_rows: Option<usize>,
    /// Multiplies every event's native weight.
    pub weight_scale: f64,
    pub selection: Selection,
    pub(crate) tag: Option<String>,
}

impl Sample {
    pub fn new(table: Arc<EventTable>) -> Self {
        Self {
            table,
            start_row: 0,
            num_rows: None,
            weight_scale: 1.0,
            selection: Selection::all(),
            tag: None,
        }
    }

    pub fn rows(mut self, start_row: usize, num_rows: usize) -> Self {
        self.start_row = start_row;
        self.num_rows = Some(num_rows);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn weight_scale(mut self, scale: f64) -> Self {
        self.weight_scale = scale;
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Tag assigned at registration (`None` before `add`).
    pub fn assigned_tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// Row-major copy of the cut variables of one sample's selected rows,
/// with weights already scaled.
#[derive(Debug, Clone)]
pub struct PackedSample {
    tag: String,
    nvars: usize,
    values: Vec<f64>,
    weights: Vec<f64>,
    total_weight: f64,
}

impl PackedSample {
    pub fn pack(sample: &Sample, spec: &CutSpec) -> Result<Self, DataError> {
        let table = sample.table.as_ref();
        let columns = spec.bind(table)?;
        let selection = sample.selection.bind(table)?;
        let rows = table.row_range(sample.start_row, sample.num_rows)?;

        let nvars = columns.len();
        let mut values = Vec::with_capacity(rows.len() * nvars);
        let mut weights = Vec::with_capacity(rows.len());
        for row in rows {
            if !selection.accepts(table, row) {
                continue;
            }
            values.extend(columns.iter().map(|&c| table.value(row, c)));
            weights.push(table.weight(row) * sample.weight_scale);
        }
        let total_weight = weights.iter().sum();

        Ok(Self {
            tag: sample.tag.clone().unwrap_or_default(),
            nvars,
            values,
            weights,
            total_weight,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn totals(&self) -> SampleTotals {
        SampleTotals {
            entries: self.weights.len() as u64,
            weight: self.total_weight,
        }
    }

    /// Cut-variable values of event `i`, in cut-spec order.
    #[inline]
    pub fn event(&self, i: usize) -> &[f64] {
        &self.values[i * self.nvars..(i + 1) * self.nvars]
    }

    #[inline]
    pub fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }

    /// Count events passing the box rule of `point`.
    pub fn count(&self, point: &CutPoint, directions: &[CutDirection]) -> SampleCounts {
        let mut unweighted = 0u64;
        let mut weighted = 0.0;
        if self.nvars > 0 {
            for (values, &w) in self.values.chunks_exact(self.nvars).zip(&self.weights) {
                if point.accepts(directions, values) {
                    unweighted += 1;
                    weighted += w;
                }
            }
        }
        SampleCounts::new(unweighted, weighted, self.total_weight)
    }
}
