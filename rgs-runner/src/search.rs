//! Search pipeline: load tables, generate cut-points, register samples, count.
//!
//! Two entry points:
//! - `prepare()`: everything up to (not including) counting. Used directly by
//!   ladder and cut-application workflows that read saved results.
//! - `run_search()`: prepare + count.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use rgs_core::apply::ApplyError;
use rgs_core::cuts::{ConfigError, CutPointSet, CutSpec, Selection};
use rgs_core::data::{self, DataError, EventTable};
use rgs_core::engine::{EngineError, RgsEngine, RunOptions, Sample};
use rgs_core::hull::HullError;
use rgs_core::results::{PersistError, ResultStore};
use rgs_core::significance::ScoreError;

use crate::config::{SampleConfig, SearchConfig};
use crate::exposure::sample_scale;

/// Errors from the search pipeline.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("results error: {0}")]
    Persist(#[from] PersistError),
    #[error("hull error: {0}")]
    Hull(#[from] HullError),
    #[error("scoring error: {0}")]
    Score(#[from] ScoreError),
    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),
}

/// How one configured sample was registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub tag: String,
    pub path: String,
    pub entries: usize,
    pub start_row: usize,
    /// Rows actually in the window (after clamping to the table end).
    pub num_rows: usize,
    pub weight_scale: f64,
    pub selection: Option<String>,
}

/// Tables loaded, cut-points generated, samples registered.
#[derive(Debug, Clone)]
pub struct PreparedSearch {
    pub config: SearchConfig,
    pub spec: CutSpec,
    pub engine: RgsEngine,
    pub samples: Vec<SampleInfo>,
    /// BLAKE3 over the cut definitions and every loaded table.
    pub dataset_hash: String,
}

/// A finished search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub prepared: PreparedSearch,
    pub store: ResultStore,
}

/// Load every input and register the samples.
pub fn prepare(config: &SearchConfig) -> Result<PreparedSearch, SearchError> {
    config.validate()?;
    let search = &config.search;
    let spec = CutSpec::from_file(&search.cuts)?;
    info!(variables = ?spec.names(), cuts = %search.cuts.display(), "cut definition loaded");

    let mut tables = TableCache::new(&search.tree, search.weight.as_deref());

    let reference = tables.get(&search.reference)?;
    let selection = match &search.selection {
        Some(expr) => Selection::parse(expr)?,
        None => Selection::all(),
    };
    let grid = CutPointSet::generate_selected(
        &spec,
        &reference,
        search.cut_start,
        search.max_cuts,
        &selection,
    )?;
    info!(
        cut_points = grid.len(),
        reference = %search.reference.display(),
        "cut-points generated"
    );

    let mut engine = RgsEngine::new(grid);
    let mut samples = Vec::with_capacity(config.samples.len());
    for sc in &config.samples {
        let table = tables.get(&sc.path)?;
        let info = register(&mut engine, sc, config, table)?;
        info!(
            tag = %info.tag,
            entries = info.entries,
            rows = info.num_rows,
            weight_scale = info.weight_scale,
            "sample added"
        );
        samples.push(info);
    }

    let dataset_hash = fingerprint(&spec, &tables.in_path_order());

    Ok(PreparedSearch {
        config: config.clone(),
        spec,
        engine,
        samples,
        dataset_hash,
    })
}

fn register(
    engine: &mut RgsEngine,
    sc: &SampleConfig,
    config: &SearchConfig,
    table: Arc<EventTable>,
) -> Result<SampleInfo, SearchError> {
    let window = table.row_range(sc.start, sc.num_rows)?;
    let scale = sample_scale(sc, config.exposure.as_ref(), table.entries(), window.len())?;
    let selection_text = sc.selection.clone().or_else(|| config.search.selection.clone());
    let selection = match &selection_text {
        Some(expr) => Selection::parse(expr)?,
        None => Selection::all(),
    };

    let mut sample = Sample::new(Arc::clone(&table))
        .rows(sc.start, window.len())
        .weight_scale(scale)
        .selection(selection);
    if let Some(tag) = &sc.tag {
        sample = sample.tag(tag.as_str());
    }
    let tag = engine.add_sample(sample)?;

    Ok(SampleInfo {
        tag,
        path: sc.path.display().to_string(),
        entries: table.entries(),
        start_row: sc.start,
        num_rows: window.len(),
        weight_scale: scale,
        selection: selection_text,
    })
}

impl PreparedSearch {
    /// Count with the configured parallelism and batch size.
    pub fn run(
        &self,
        progress: Option<&dyn Fn(usize, usize)>,
        cancel: Option<&AtomicBool>,
    ) -> Result<ResultStore, SearchError> {
        let options = RunOptions {
            batch_size: self.config.search.batch_size,
            parallel: self.config.search.parallel,
            progress,
            cancel,
        };
        Ok(self.engine.run_with(&self.spec, &options)?)
    }

    pub fn sample(&self, tag: &str) -> Option<&SampleInfo> {
        let tag = tag.trim_start_matches('_');
        self.samples.iter().find(|s| s.tag == tag)
    }
}

/// Load, generate, and count.
pub fn run_search(
    config: &SearchConfig,
    progress: Option<&dyn Fn(usize, usize)>,
    cancel: Option<&AtomicBool>,
) -> Result<SearchOutcome, SearchError> {
    let prepared = prepare(config)?;
    let store = prepared.run(progress, cancel)?;
    Ok(SearchOutcome { prepared, store })
}

// ─── Table loading ──────────────────────────────────────────────────

/// Loads each distinct path once.
struct TableCache<'a> {
    tree: &'a str,
    weight: Option<&'a str>,
    tables: HashMap<PathBuf, Arc<EventTable>>,
}

impl<'a> TableCache<'a> {
    fn new(tree: &'a str, weight: Option<&'a str>) -> Self {
        Self {
            tree,
            weight,
            tables: HashMap::new(),
        }
    }

    fn get(&mut self, path: &Path) -> Result<Arc<EventTable>, DataError> {
        if let Some(t) = self.tables.get(path) {
            return Ok(Arc::clone(t));
        }
        let table = Arc::new(data::open(path, self.tree, self.weight)?);
        self.tables.insert(path.to_path_buf(), Arc::clone(&table));
        Ok(table)
    }

    fn in_path_order(&self) -> Vec<(&Path, &EventTable)> {
        let mut v: Vec<(&Path, &EventTable)> = self
            .tables
            .iter()
            .map(|(p, t)| (p.as_path(), t.as_ref()))
            .collect();
        v.sort_by(|a, b| a.0.cmp(b.0));
        v
    }
}

/// Deterministic BLAKE3 hash over the cut definitions and table contents.
///
/// Tables are hashed in path order; file names (not full paths) are included
/// so moving a dataset directory keeps the hash.
fn fingerprint(spec: &CutSpec, tables: &[(&Path, &EventTable)]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(spec.to_text().as_bytes());

    for (path, table) in tables {
        let file = path.file_name().map(|f| f.to_string_lossy()).unwrap_or_default();
        hasher.update(file.as_bytes());
        for (c, name) in table.column_names().iter().enumerate() {
            hasher.update(name.as_bytes());
            for v in table.column(c) {
                hasher.update(&v.to_le_bytes());
            }
        }
        for w in table.weights() {
            hasher.update(&w.to_le_bytes());
        }
    }

    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_depends_on_values() {
        let spec = CutSpec::parse("x >").unwrap();
        let a = EventTable::from_columns("t", vec![("x".into(), vec![1.0, 2.0])], None).unwrap();
        let b = EventTable::from_columns("t", vec![("x".into(), vec![1.0, 2.5])], None).unwrap();
        let p = Path::new("data/t.csv");
        let ha = fingerprint(&spec, &[(p, &a)]);
        assert_eq!(ha, fingerprint(&spec, &[(p, &a)]));
        assert_ne!(ha, fingerprint(&spec, &[(p, &b)]));
        assert_eq!(ha, fingerprint(&spec, &[(Path::new("/elsewhere/t.csv"), &a)]));
        assert_eq!(ha.len(), 64);
    }
}
