//! Post-search analysis: best single cut, ladder construction, cut application.

use serde::{Deserialize, Serialize};
use tracing::info;

use rgs_core::apply::{apply_cuts, CutYield};
use rgs_core::cuts::{ConfigError, CutPoint};
use rgs_core::hull::{FinalizedHull, HullPoint, Ladder, OuterHull};
use rgs_core::results::ResultStore;
use rgs_core::significance::{best_cut, BestCut};

use crate::config::LadderConfig;
use crate::search::{PreparedSearch, SearchError};

/// First row with maximal significance, if any.
pub fn find_best_cut(
    store: &ResultStore,
    signal_tag: &str,
    background_tag: &str,
) -> Result<Option<BestCut>, SearchError> {
    let best = best_cut(store, signal_tag, background_tag)?;
    match &best {
        Some(b) => info!(row = b.row, z = b.z, "best cut found"),
        None => info!("no cut-points to rank"),
    }
    Ok(best)
}

/// The selected ladder plus the frontier it was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderReport {
    pub x: String,
    pub y: String,
    pub frontier: Vec<HullPoint>,
    pub ladder: Ladder,
}

/// Build the outer hull over `store` and pick a ladder per `config`.
///
/// `store` must come from the samples registered in `prepared`; the ladder's
/// aggregate yield is recounted on them.
pub fn build_ladder(
    prepared: &PreparedSearch,
    store: &ResultStore,
    config: &LadderConfig,
) -> Result<LadderReport, SearchError> {
    let hull = finalize_hull(prepared, store, config)?;
    let ladder = match config.target_z {
        Some(z) => hull.query_target(z),
        None => hull.query(config.index),
    };
    info!(
        hull = hull.len(),
        steps = ladder.len(),
        z = ladder.z,
        "ladder selected"
    );
    Ok(LadderReport {
        x: config.x.clone(),
        y: config.y.clone(),
        frontier: hull.frontier(),
        ladder,
    })
}

pub fn finalize_hull(
    prepared: &PreparedSearch,
    store: &ResultStore,
    config: &LadderConfig,
) -> Result<FinalizedHull, SearchError> {
    let signal = prepared.engine.pack(&prepared.spec, &config.signal)?;
    let background = prepared.engine.pack(&prepared.spec, &config.background)?;
    let hull = OuterHull::from_store(config.hull_config(), &prepared.spec, store)?;
    Ok(hull.finalize(&signal, &background)?)
}

/// Yield of a selection on one registered sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleYield {
    pub tag: String,
    #[serde(flatten)]
    pub counts: CutYield,
}

/// Apply the OR of `points` to every registered sample, in registration order.
pub fn apply_to_samples(
    prepared: &PreparedSearch,
    points: &[CutPoint],
) -> Result<Vec<SampleYield>, SearchError> {
    prepared
        .engine
        .samples()
        .iter()
        .map(|s| -> Result<SampleYield, SearchError> {
            Ok(SampleYield {
                tag: s.assigned_tag().unwrap_or_default().to_string(),
                counts: apply_cuts(&prepared.spec, points, s)?,
            })
        })
        .collect()
}

/// Fail unless `store` was produced with the cut variables of `prepared`, in
/// the same order.
pub fn check_store_variables(
    prepared: &PreparedSearch,
    store: &ResultStore,
) -> Result<(), SearchError> {
    let names = prepared.spec.names();
    if store.variables() != names.as_slice() {
        return Err(ConfigError::VariableMismatch {
            expected: store.variables().to_vec(),
            actual: names,
        }
        .into());
    }
    Ok(())
}

/// Apply the cut-point of one saved result row to every registered sample.
pub fn apply_store_row(
    prepared: &PreparedSearch,
    store: &ResultStore,
    index: usize,
) -> Result<Vec<SampleYield>, SearchError> {
    check_store_variables(prepared, store)?;
    let row = store.row(index).ok_or_else(|| {
        ConfigError::Invalid(format!("row {index} is out of range ({} rows)", store.len()))
    })?;
    apply_to_samples(prepared, std::slice::from_ref(&row.cut_point))
}
