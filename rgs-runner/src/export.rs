//! Artifact export: result table, JSON manifest, ladder CSV.
//!
//! A search writes two files:
//! - the result store at `search.output` (CSV, or Parquet for `.parquet`)
//! - `<stem>.manifest.json` next to it: what was run, on which data
//!
//! The manifest carries a `schema_version`. Unknown versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use rgs_core::engine::SampleTotals;
use rgs_core::results::ResultStore;

use crate::analysis::LadderReport;
use crate::search::{SampleInfo, SearchOutcome};

/// Current schema version for persisted manifests.
pub const SCHEMA_VERSION: u32 = 1;

/// Provenance of a saved result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// RFC 3339, UTC.
    pub created_at: String,
    pub dataset_hash: String,
    /// Cut definitions in file form.
    pub cuts: String,
    pub selection: Option<String>,
    pub reference: String,
    pub cut_start: usize,
    pub cut_points: usize,
    pub samples: Vec<SampleInfo>,
    /// Entries and total weight after preselection, in sample order.
    pub totals: Vec<SampleTotals>,
    pub results: String,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl SearchManifest {
    pub fn from_outcome(outcome: &SearchOutcome, results: &Path) -> Self {
        let prepared = &outcome.prepared;
        let search = &prepared.config.search;
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            dataset_hash: prepared.dataset_hash.clone(),
            cuts: prepared.spec.to_text(),
            selection: search.selection.clone(),
            reference: search.reference.display().to_string(),
            cut_start: search.cut_start,
            cut_points: outcome.store.len(),
            samples: prepared.samples.clone(),
            totals: outcome.store.totals().map(<[_]>::to_vec).unwrap_or_default(),
            results: results.display().to_string(),
        }
    }
}

// ─── JSON manifest ──────────────────────────────────────────────────

pub fn export_manifest_json(manifest: &SearchManifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize search manifest")
}

pub fn import_manifest_json(json: &str) -> Result<SearchManifest> {
    let manifest: SearchManifest =
        serde_json::from_str(json).context("failed to deserialize search manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

/// `rgs.csv` → `rgs.manifest.json`, in the same directory.
pub fn manifest_path(results: &Path) -> PathBuf {
    let stem = results
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rgs".to_string());
    results.with_file_name(format!("{stem}.manifest.json"))
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the result store to `search.output` and write its manifest.
///
/// Returns the manifest path.
pub fn save_artifacts(outcome: &SearchOutcome) -> Result<PathBuf> {
    let results = &outcome.prepared.config.search.output;
    outcome
        .store
        .save(results)
        .with_context(|| format!("failed to save results to {}", results.display()))?;

    let manifest = SearchManifest::from_outcome(outcome, results);
    let path = manifest_path(results);
    std::fs::write(&path, export_manifest_json(&manifest)?)
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(results = %results.display(), manifest = %path.display(), "artifacts saved");
    Ok(path)
}

/// Load a result store and, when present, its manifest.
pub fn load_artifacts(results: &Path) -> Result<(ResultStore, Option<SearchManifest>)> {
    let store = ResultStore::load(results)
        .with_context(|| format!("failed to load results from {}", results.display()))?;

    let path = manifest_path(results);
    let manifest = if path.is_file() {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Some(import_manifest_json(&json)?)
    } else {
        None
    };
    Ok((store, manifest))
}

// ─── Ladder CSV ─────────────────────────────────────────────────────

/// One line per ladder step with its plane thresholds and incremental yield.
///
/// Columns: step, row, `<x>_cut`, `<y>_cut`, z, signal_new, background_new,
/// signal_new_weighted, background_new_weighted
pub fn export_ladder_csv(report: &LadderReport, x_index: usize, y_index: usize) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "step".to_string(),
        "row".to_string(),
        format!("{}_cut", report.x),
        format!("{}_cut", report.y),
        "z".to_string(),
        "signal_new".to_string(),
        "background_new".to_string(),
        "signal_new_weighted".to_string(),
        "background_new_weighted".to_string(),
    ])?;

    for (i, step) in report.ladder.steps.iter().enumerate() {
        let t = step.cut_point.thresholds();
        let (Some(x), Some(y)) = (t.get(x_index), t.get(y_index)) else {
            bail!("ladder step {i} has no threshold for the cut plane axes");
        };
        wtr.write_record([
            (i + 1).to_string(),
            step.row.to_string(),
            x.to_string(),
            y.to_string(),
            format!("{:.6}", step.z),
            step.signal.unweighted.to_string(),
            step.background.unweighted.to_string(),
            format!("{:.6}", step.signal.weighted),
            format!("{:.6}", step.background.weighted),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
