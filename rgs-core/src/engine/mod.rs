//! Random grid search counting engine.
//!
//! For every cut-point and every registered sample, count the events (and
//! their scaled weight) passing the AND of all per-variable cuts. Work is
//! split into cut-point batches; batches run in parallel with rayon and are
//! collected in generation order, so serial and parallel runs produce
//! identical result stores.

pub mod counts;
pub mod sample;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cuts::{ConfigError, CutDirection, CutPoint, CutPointSet, CutSpec};
use crate::data::{DataError, EventTable};
use crate::results::{ResultRow, ResultStore};

pub use counts::{fraction, SampleCounts, SampleTotals};
pub use sample::{PackedSample, Sample};

/// Default number of cut-points between cancellation checks.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Errors from the counting engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("run cancelled after {completed} of {total} cut-points")]
    Cancelled {
        completed: usize,
        total: usize,
        /// Rows of the batches that finished, in generation order.
        partial: Box<ResultStore>,
    },

    #[error("no sample tagged '{0}'")]
    UnknownTag(String),
}

/// Controls for a single run.
pub struct RunOptions<'a> {
    /// Cut-points per batch; cancellation is checked between batches.
    pub batch_size: usize,
    pub parallel: bool,
    /// Called after each batch with `(completed, total)` cut-points.
    pub progress: Option<&'a dyn Fn(usize, usize)>,
    /// Cooperative stop flag, checked between batches.
    pub cancel: Option<&'a AtomicBool>,
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: true,
            progress: None,
            cancel: None,
        }
    }
}

/// The counting engine: a cut-point grid plus an ordered list of samples.
///
/// `run` does not mutate the engine, so the same registrations can be rerun
/// or sharded.
#[derive(Debug, Clone)]
pub struct RgsEngine {
    cut_points: CutPointSet,
    samples: Vec<Sample>,
}

impl RgsEngine {
    pub fn new(cut_points: CutPointSet) -> Self {
        Self {
            cut_points,
            samples: Vec::new(),
        }
    }

    pub fn cut_points(&self) -> &CutPointSet {
        &self.cut_points
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Register `table[start_row..start_row + num_rows]` with scaled weights.
    ///
    /// `tag` becomes the column suffix (`count_<tag>`, `fraction_<tag>`); a
    /// leading `_` is dropped. Without a tag the insertion index is used.
    /// Returns the tag actually assigned.
    pub fn add(
        &mut self,
        table: Arc<EventTable>,
        start_row: usize,
        num_rows: usize,
        tag: Option<&str>,
        weight_scale: f64,
    ) -> Result<String, EngineError> {
        let mut sample = Sample::new(table)
            .rows(start_row, num_rows)
            .weight_scale(weight_scale);
        if let Some(tag) = tag {
            sample = sample.tag(tag);
        }
        self.add_sample(sample)
    }

    /// Register a fully described sample. Returns the assigned tag.
    pub fn add_sample(&mut self, mut sample: Sample) -> Result<String, EngineError> {
        if !sample.weight_scale.is_finite() || sample.weight_scale < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "weight scale must be finite and non-negative, got {}",
                sample.weight_scale
            ))
            .into());
        }

        let tag = match sample.tag.as_deref() {
            Some(t) => t.trim_start_matches('_').to_string(),
            None => self.samples.len().to_string(),
        };
        if tag.is_empty() || tag.contains(|c: char| c.is_whitespace() || c == ',') {
            return Err(ConfigError::Invalid(format!("invalid sample tag '{tag}'")).into());
        }
        if self.samples.iter().any(|s| s.tag.as_deref() == Some(tag.as_str())) {
            return Err(ConfigError::Invalid(format!("duplicate sample tag '{tag}'")).into());
        }

        sample.table.row_range(sample.start_row, sample.num_rows)?;

        info!(
            tag = %tag,
            table = sample.table.name(),
            start = sample.start_row,
            rows = ?sample.num_rows,
            weight_scale = sample.weight_scale,
            "sample registered"
        );
        sample.tag = Some(tag.clone());
        self.samples.push(sample);
        Ok(tag)
    }

    /// Resolve columns for one registered sample and copy out its cut variables.
    pub fn pack(&self, spec: &CutSpec, tag: &str) -> Result<PackedSample, EngineError> {
        let tag = tag.trim_start_matches('_');
        let sample = self
            .samples
            .iter()
            .find(|s| s.tag.as_deref() == Some(tag))
            .ok_or_else(|| EngineError::UnknownTag(tag.to_string()))?;
        Ok(PackedSample::pack(sample, spec)?)
    }

    /// Count every cut-point on every sample with default options.
    pub fn run(&self, spec: &CutSpec) -> Result<ResultStore, EngineError> {
        self.run_with(spec, &RunOptions::default())
    }

    pub fn run_with(
        &self,
        spec: &CutSpec,
        options: &RunOptions<'_>,
    ) -> Result<ResultStore, EngineError> {
        let names = spec.names();
        if names.as_slice() != self.cut_points.variables() {
            return Err(ConfigError::VariableMismatch {
                expected: self.cut_points.variables().to_vec(),
                actual: names,
            }
            .into());
        }

        let packed = self
            .samples
            .iter()
            .map(|s| PackedSample::pack(s, spec))
            .collect::<Result<Vec<_>, DataError>>()?;
        let tags: Vec<String> = packed.iter().map(|p| p.tag().to_string()).collect();
        let totals: Vec<SampleTotals> = packed.iter().map(PackedSample::totals).collect();
        for (tag, t) in tags.iter().zip(&totals) {
            if t.weight <= 0.0 {
                warn!(tag = %tag, entries = t.entries, "sample has zero total weight; fractions will be 0");
            }
        }

        let directions = spec.directions();
        let total = self.cut_points.len();
        let batch_size = options.batch_size.max(1);
        info!(
            cut_points = total,
            samples = packed.len(),
            variables = names.len(),
            parallel = options.parallel,
            "running grid search"
        );

        let mut rows: Vec<ResultRow> = Vec::with_capacity(total);
        for batch in self.cut_points.points().chunks(batch_size) {
            if options.cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                warn!(completed = rows.len(), total, "grid search cancelled");
                let completed = rows.len();
                let partial = ResultStore::from_engine(names, tags, totals, rows);
                return Err(EngineError::Cancelled {
                    completed,
                    total,
                    partial: Box::new(partial),
                });
            }

            let counted: Vec<ResultRow> = if options.parallel {
                batch
                    .par_iter()
                    .map(|p| count_point(p, &directions, &packed))
                    .collect()
            } else {
                batch
                    .iter()
                    .map(|p| count_point(p, &directions, &packed))
                    .collect()
            };
            rows.extend(counted);

            if let Some(cb) = options.progress {
                cb(rows.len(), total);
            }
            debug!(completed = rows.len(), total, "batch done");
        }

        info!(rows = rows.len(), "grid search complete");
        Ok(ResultStore::from_engine(names, tags, totals, rows))
    }
}

fn count_point(point: &CutPoint, directions: &[CutDirection], samples: &[PackedSample]) -> ResultRow {
    ResultRow {
        cut_point: point.clone(),
        counts: samples.iter().map(|s| s.count(point, directions)).collect(),
    }
}
