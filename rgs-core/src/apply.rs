//! Yield of a single cut or a ladder on an arbitrary sample.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cuts::{CutPoint, CutSpec};
use crate::data::DataError;
use crate::engine::{PackedSample, Sample};

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("cut-point {index} has {actual} thresholds but the cut definition has {expected} variables")]
    PointArity {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Totals of a sample and the part of it a selection keeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutYield {
    /// Events after preselection.
    pub entries: u64,
    /// Their total scaled weight.
    pub weight: f64,
    pub passed: u64,
    pub passed_weight: f64,
}

/// Apply the OR of `points` (one point = a plain box cut) to `sample`.
///
/// An empty `points` slice passes nothing. Every point must carry one
/// threshold per variable of `spec`.
pub fn apply_cuts(
    spec: &CutSpec,
    points: &[CutPoint],
    sample: &Sample,
) -> Result<CutYield, ApplyError> {
    if let Some((index, p)) = points.iter().enumerate().find(|(_, p)| p.len() != spec.len()) {
        return Err(ApplyError::PointArity {
            index,
            expected: spec.len(),
            actual: p.len(),
        });
    }

    let packed = PackedSample::pack(sample, spec)?;
    let directions = spec.directions();
    let totals = packed.totals();

    let mut passed = 0u64;
    let mut passed_weight = 0.0;
    for i in 0..packed.len() {
        let event = packed.event(i);
        if points.iter().any(|p| p.accepts(&directions, event)) {
            passed += 1;
            passed_weight += packed.weight(i);
        }
    }

    Ok(CutYield {
        entries: totals.entries,
        weight: totals.weight,
        passed,
        passed_weight,
    })
}
