//! Outer hull and ladder construction.
//!
//! An [`OuterHull`] accumulates scored result rows. [`OuterHull::finalize`]
//! computes the Pareto frontier in the (background fraction, signal fraction)
//! plane, orders it by increasing background fraction, and rescans both
//! samples once to get the OR-aggregate yield of every hull prefix. The
//! resulting [`FinalizedHull`] is read-only and answers ladder queries.
//!
//! Two of the search variables span the cut plane used for ladder regions.
//! Event acceptance always uses the full cut-point.

pub mod frontier;
pub mod ladder;
pub mod region;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::cuts::{CutDirection, CutPoint, CutSpec};
use crate::engine::{PackedSample, SampleCounts};
use crate::results::ResultStore;
use crate::significance::{significance, ScoreError, Scored, SignificanceScorer};

pub use frontier::{dominates, mark_frontier, HullPoint};
pub use ladder::{Increment, Ladder, LadderStep};
pub use region::{AxisCut, Bounds, CutRegion, Rect};

use ladder::OrAccumulator;

#[derive(Debug, Error)]
pub enum HullError {
    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error("cut plane variable '{0}' is not a search variable")]
    UnknownVariable(String),

    #[error("cut plane needs two different variables, got '{0}' twice")]
    SameAxis(String),

    #[error("invalid cut plane bounds {0:?}")]
    InvalidBounds(Bounds),

    #[error("results were produced for {expected:?} but the cut spec declares {actual:?}")]
    VariableMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("row {row}: cut-point has {actual} thresholds, expected {expected}")]
    PointArity {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("expected the {role} sample '{expected}', got '{actual}'")]
    SampleTag {
        role: &'static str,
        expected: String,
        actual: String,
    },
}

/// Which variables span the cut plane, its bounds, and the sample roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HullConfig {
    pub x: String,
    pub y: String,
    pub bounds: Bounds,
    pub signal_tag: String,
    pub background_tag: String,
}

fn same_tag(a: &str, b: &str) -> bool {
    a.trim_start_matches('_') == b.trim_start_matches('_')
}

// ─── Accumulating ────────────────────────────────────────────────────

/// A hull still collecting points.
#[derive(Debug, Clone)]
pub struct OuterHull {
    config: HullConfig,
    directions: Vec<CutDirection>,
    x: usize,
    y: usize,
    points: Vec<HullPoint>,
    cut_points: Vec<CutPoint>,
}

impl OuterHull {
    pub fn new(config: HullConfig, spec: &CutSpec) -> Result<Self, HullError> {
        let x = spec
            .index_of(&config.x)
            .ok_or_else(|| HullError::UnknownVariable(config.x.clone()))?;
        let y = spec
            .index_of(&config.y)
            .ok_or_else(|| HullError::UnknownVariable(config.y.clone()))?;
        if x == y {
            return Err(HullError::SameAxis(config.x.clone()));
        }
        if !config.bounds.is_valid() {
            return Err(HullError::InvalidBounds(config.bounds));
        }
        Ok(Self {
            config,
            directions: spec.directions(),
            x,
            y,
            points: Vec::new(),
            cut_points: Vec::new(),
        })
    }

    /// Score every row of `store` and add it.
    pub fn from_store(
        config: HullConfig,
        spec: &CutSpec,
        store: &ResultStore,
    ) -> Result<Self, HullError> {
        let names = spec.names();
        if store.variables() != names.as_slice() {
            return Err(HullError::VariableMismatch {
                expected: store.variables().to_vec(),
                actual: names,
            });
        }
        let scorer = SignificanceScorer::new(store, &config.signal_tag, &config.background_tag)?;
        let mut hull = Self::new(config, spec)?;
        for sc in scorer.scores() {
            if let Some(row) = store.row(sc.row) {
                hull.add(sc, row.cut_point.clone())?;
            }
        }
        Ok(hull)
    }

    pub fn add(&mut self, scored: Scored, cut_point: CutPoint) -> Result<(), HullError> {
        if cut_point.len() != self.directions.len() {
            return Err(HullError::PointArity {
                row: scored.row,
                expected: self.directions.len(),
                actual: cut_point.len(),
            });
        }
        self.points.push(scored.into());
        self.cut_points.push(cut_point);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Compute the frontier and the OR-aggregate yield of every prefix.
    ///
    /// `signal` and `background` must be the packed samples the results were
    /// counted on.
    pub fn finalize(
        mut self,
        signal: &PackedSample,
        background: &PackedSample,
    ) -> Result<FinalizedHull, HullError> {
        for (role, expected, sample) in [
            ("signal", &self.config.signal_tag, signal),
            ("background", &self.config.background_tag, background),
        ] {
            if !same_tag(expected, sample.tag()) {
                return Err(HullError::SampleTag {
                    role,
                    expected: expected.clone(),
                    actual: sample.tag().to_string(),
                });
            }
        }

        let frontier = mark_frontier(&mut self.points);
        debug!(
            points = self.points.len(),
            frontier = frontier.len(),
            "hull frontier computed"
        );

        let mut sig = OrAccumulator::new(signal);
        let mut bkg = OrAccumulator::new(background);
        let mut steps = Vec::with_capacity(frontier.len());
        let mut prefixes = Vec::with_capacity(frontier.len());
        for &i in &frontier {
            let point = &self.points[i];
            let cut_point = &self.cut_points[i];
            let t = cut_point.thresholds();
            let region = CutRegion::new(
                AxisCut {
                    direction: self.directions[self.x],
                    threshold: t[self.x],
                },
                AxisCut {
                    direction: self.directions[self.y],
                    threshold: t[self.y],
                },
                &self.config.bounds,
            );
            let s_inc = sig.add(cut_point, &self.directions);
            let b_inc = bkg.add(cut_point, &self.directions);
            steps.push(LadderStep {
                row: point.row,
                cut_point: cut_point.clone(),
                region,
                z: point.z,
                signal: s_inc,
                background: b_inc,
            });

            let (s, b) = (sig.counts(), bkg.counts());
            prefixes.push(Prefix {
                z: significance(s.weighted, b.weighted),
                signal: s,
                background: b,
            });
        }

        let hull = FinalizedHull {
            config: self.config,
            points: self.points,
            frontier,
            steps,
            prefixes,
        };
        if let Some(best) = hull.best_prefix() {
            info!(
                hull = hull.frontier.len(),
                best_steps = best,
                best_z = hull.prefixes[best - 1].z,
                "hull finalized"
            );
        }
        Ok(hull)
    }
}

// ─── Finalized ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct Prefix {
    signal: SampleCounts,
    background: SampleCounts,
    z: f64,
}

/// A read-only hull with precomputed prefix yields.
#[derive(Debug, Clone)]
pub struct FinalizedHull {
    config: HullConfig,
    points: Vec<HullPoint>,
    frontier: Vec<usize>,
    steps: Vec<LadderStep>,
    prefixes: Vec<Prefix>,
}

impl FinalizedHull {
    pub fn config(&self) -> &HullConfig {
        &self.config
    }

    /// Every added point with its dominance flag, in insertion order.
    pub fn points(&self) -> &[HullPoint] {
        &self.points
    }

    /// Non-dominated points ordered by increasing background fraction.
    pub fn frontier(&self) -> Vec<HullPoint> {
        self.frontier.iter().map(|&i| self.points[i]).collect()
    }

    pub fn len(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Length of the first prefix with maximal aggregate `Z`.
    pub fn best_prefix(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.prefixes.iter().enumerate() {
            if best.map_or(true, |(_, z)| p.z > z) {
                best = Some((i + 1, p.z));
            }
        }
        best.map(|(n, _)| n)
    }

    /// `0` → the global-best ladder; `k` → the first `k` hull points
    /// (clamped to the hull size).
    pub fn query(&self, index: usize) -> Ladder {
        let n = if index == 0 {
            self.best_prefix().unwrap_or(0)
        } else {
            index.min(self.len())
        };
        self.prefix(n)
    }

    /// Shortest prefix whose aggregate `Z` reaches `target`, or the whole
    /// hull if none does. `target` is on the [`crate::significance()`] scale,
    /// √2 above the textbook Asimov Z.
    pub fn query_target(&self, target: f64) -> Ladder {
        let n = self
            .prefixes
            .iter()
            .position(|p| p.z >= target)
            .map_or(self.len(), |i| i + 1);
        self.prefix(n)
    }

    fn prefix(&self, n: usize) -> Ladder {
        match n.checked_sub(1).and_then(|i| self.prefixes.get(i)) {
            Some(p) => Ladder {
                steps: self.steps[..n].to_vec(),
                signal: p.signal,
                background: p.background,
                z: p.z,
            },
            None => Ladder {
                steps: Vec::new(),
                signal: SampleCounts::zero(),
                background: SampleCounts::zero(),
                z: 0.0,
            },
        }
    }
}
