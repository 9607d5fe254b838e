//! Counting-experiment significance and best single cut.
//!
//! `Z` is the asymptotic significance of `s` signal events over an expected
//! background `b` in one bin:
//!
//! ```text
//! b <= 1 : Z = 0
//! else   : LR = 2 ((s+b) ln((s+b)/b) - s)
//!          Z  = sign(LR) sqrt(2 |LR|)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::SampleCounts;
use crate::results::ResultStore;

/// Background at or below which `Z` is defined as 0.
pub const MIN_BACKGROUND: f64 = 1.0;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("no sample tagged '{tag}' in results (tags: {available:?})")]
    UnknownTag { tag: String, available: Vec<String> },
}

/// Significance of weighted signal count `s` over background count `b`.
///
/// Total over finite inputs: `b <= 1` (including `s + b == 0`) gives 0, as
/// does any non-finite input.
pub fn significance(s: f64, b: f64) -> f64 {
    if !s.is_finite() || !b.is_finite() || b <= MIN_BACKGROUND {
        return 0.0;
    }
    let n = s + b;
    let lr = 2.0 * (n * (n / b).ln() - s);
    if !lr.is_finite() {
        return 0.0;
    }
    lr.signum() * (2.0 * lr.abs()).sqrt()
}

// ─── Scoring result rows ─────────────────────────────────────────────

/// One result row projected onto the signal/background plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scored {
    pub row: usize,
    /// Signal fraction.
    pub fs: f64,
    /// Background fraction.
    pub fb: f64,
    /// Weighted signal count.
    pub s: f64,
    /// Weighted background count.
    pub b: f64,
    pub z: f64,
}

/// The best single cut-point of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCut {
    pub row: usize,
    pub z: f64,
    pub variables: Vec<String>,
    pub thresholds: Vec<f64>,
    pub signal: SampleCounts,
    pub background: SampleCounts,
}

/// Scores the rows of a result store for one signal/background tag pair.
#[derive(Debug, Clone, Copy)]
pub struct SignificanceScorer<'a> {
    store: &'a ResultStore,
    signal: usize,
    background: usize,
}

impl<'a> SignificanceScorer<'a> {
    pub fn new(
        store: &'a ResultStore,
        signal_tag: &str,
        background_tag: &str,
    ) -> Result<Self, ScoreError> {
        let lookup = |tag: &str| {
            store.tag_index(tag).ok_or_else(|| ScoreError::UnknownTag {
                tag: tag.to_string(),
                available: store.tags().to_vec(),
            })
        };
        Ok(Self {
            store,
            signal: lookup(signal_tag)?,
            background: lookup(background_tag)?,
        })
    }

    pub fn store(&self) -> &'a ResultStore {
        self.store
    }

    pub fn signal_index(&self) -> usize {
        self.signal
    }

    pub fn background_index(&self) -> usize {
        self.background
    }

    pub fn score(&self, row: usize) -> Option<Scored> {
        let r = self.store.row(row)?;
        let sig = &r.counts[self.signal];
        let bkg = &r.counts[self.background];
        Some(Scored {
            row,
            fs: sig.fraction,
            fb: bkg.fraction,
            s: sig.weighted,
            b: bkg.weighted,
            z: significance(sig.weighted, bkg.weighted),
        })
    }

    /// Every row, in store order.
    pub fn scores(&self) -> impl Iterator<Item = Scored> + '_ {
        (0..self.store.len()).filter_map(move |i| self.score(i))
    }

    /// First row with maximal `Z`; `None` for an empty store.
    pub fn best(&self) -> Option<BestCut> {
        let mut best: Option<Scored> = None;
        for sc in self.scores() {
            if best.map_or(true, |b| sc.z > b.z) {
                best = Some(sc);
            }
        }
        let best = best?;
        let row = self.store.row(best.row)?;
        Some(BestCut {
            row: best.row,
            z: best.z,
            variables: self.store.variables().to_vec(),
            thresholds: row.cut_point.thresholds().to_vec(),
            signal: row.counts[self.signal],
            background: row.counts[self.background],
        })
    }
}

/// Scan `store` for the first row with maximal `Z`.
pub fn best_cut(
    store: &ResultStore,
    signal_tag: &str,
    background_tag: &str,
) -> Result<Option<BestCut>, ScoreError> {
    Ok(SignificanceScorer::new(store, signal_tag, background_tag)?.best())
}
