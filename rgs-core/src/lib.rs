//! RGS Core — random grid search for cut-based event selection.
//!
//! This crate contains the search itself:
//! - Cut definitions, preselection, and the candidate cut-point grid
//! - Weighted event tables and their CSV / Parquet loaders
//! - The counting engine (cut-point batches, optionally parallel)
//! - Result store and its persisted form
//! - Counting-experiment significance and best single cut
//! - Outer hull and OR-of-box ladder selections

pub mod apply;
pub mod cuts;
pub mod data;
pub mod engine;
pub mod hull;
pub mod results;
pub mod significance;

pub use apply::{apply_cuts, ApplyError, CutYield};
pub use cuts::{ConfigError, CutDirection, CutPoint, CutPointSet, CutSpec, Selection, Variable};
pub use data::{DataError, EventTable};
pub use engine::{EngineError, PackedSample, RgsEngine, RunOptions, Sample, SampleCounts, SampleTotals};
pub use hull::{Bounds, FinalizedHull, HullConfig, HullError, Ladder, OuterHull};
pub use results::{PersistError, ResultRow, ResultStore};
pub use significance::{best_cut, significance, BestCut, ScoreError, SignificanceScorer};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed to worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<EventTable>();
        require_sync::<EventTable>();
        require_send::<CutSpec>();
        require_sync::<CutSpec>();
        require_send::<CutPointSet>();
        require_sync::<CutPointSet>();
        require_send::<PackedSample>();
        require_sync::<PackedSample>();
        require_send::<RgsEngine>();
        require_sync::<RgsEngine>();
        require_send::<ResultStore>();
        require_sync::<ResultStore>();
        require_send::<FinalizedHull>();
        require_sync::<FinalizedHull>();
        require_send::<EngineError>();
        require_send::<HullError>();
    }
}
