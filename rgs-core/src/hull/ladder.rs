//! Ladder selections: the OR of several box cuts.
//!
//! Aggregate yields are measured by rescanning events with
//! "pass if any constituent passes". Events accepted by an earlier step are
//! not counted again, so per-step counts are incremental and sum to the
//! aggregate.

use serde::{Deserialize, Serialize};

use super::region::CutRegion;
use crate::cuts::{CutDirection, CutPoint};
use crate::engine::{PackedSample, SampleCounts};

/// Events and weight newly accepted by one ladder step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Increment {
    pub unweighted: u64,
    pub weighted: f64,
}

/// One OR term of a ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderStep {
    /// Row index in the result store.
    pub row: usize,
    pub cut_point: CutPoint,
    pub region: CutRegion,
    /// Significance of this cut-point on its own.
    pub z: f64,
    pub signal: Increment,
    pub background: Increment,
}

/// An ordered OR of cut-points with its aggregate yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ladder {
    pub steps: Vec<LadderStep>,
    pub signal: SampleCounts,
    pub background: SampleCounts,
    pub z: f64,
}

impl Ladder {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn cut_points(&self) -> Vec<CutPoint> {
        self.steps.iter().map(|s| s.cut_point.clone()).collect()
    }

    /// Is `(x, y)` inside the union of the steps' regions?
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.steps.iter().any(|s| s.region.contains(x, y))
    }

    /// Does an event (cut variables in cut-spec order) pass any step?
    pub fn accepts(&self, directions: &[CutDirection], values: &[f64]) -> bool {
        self.steps
            .iter()
            .any(|s| s.cut_point.accepts(directions, values))
    }
}

/// Running OR over one packed sample.
pub(crate) struct OrAccumulator<'a> {
    sample: &'a PackedSample,
    passed: Vec<bool>,
    unweighted: u64,
    weighted: f64,
}

impl<'a> OrAccumulator<'a> {
    pub(crate) fn new(sample: &'a PackedSample) -> Self {
        Self {
            sample,
            passed: vec![false; sample.len()],
            unweighted: 0,
            weighted: 0.0,
        }
    }

    /// OR in one more cut-point; returns what it newly accepts.
    pub(crate) fn add(&mut self, point: &CutPoint, directions: &[CutDirection]) -> Increment {
        let mut inc = Increment::default();
        for (i, passed) in self.passed.iter_mut().enumerate() {
            if *passed || !point.accepts(directions, self.sample.event(i)) {
                continue;
            }
            *passed = true;
            inc.unweighted += 1;
            inc.weighted += self.sample.weight(i);
        }
        self.unweighted += inc.unweighted;
        self.weighted += inc.weighted;
        inc
    }

    pub(crate) fn counts(&self) -> SampleCounts {
        SampleCounts::new(self.unweighted, self.weighted, self.sample.totals().weight)
    }
}
