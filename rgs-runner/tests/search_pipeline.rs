//! BDD tests for the search pipeline.
//!
//! These tests verify the runner end to end on small CSV datasets:
//! - Search run, artifact export and reload
//! - Best single cut and ladder selection
//! - Cut application to the registered samples
//! - Hard failures (missing inputs, unknown columns) and cancellation

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use rgs_core::data::DataError;
use rgs_core::engine::EngineError;
use rgs_core::significance::SignificanceScorer;
use rgs_core::cuts::ConfigError;
use rgs_runner::{
    apply_store_row, apply_to_samples, build_ladder, find_best_cut, load_artifacts, prepare,
    run_search, save_artifacts, SearchConfig, SearchError,
};

// ── Fixtures ─────────────────────────────────────────────────────────

/// Signal sits at large |Δη| and m_jj, background at small values.
fn write_inputs(dir: &Path) {
    let mut sig = String::from("f_deltajj,f_massjj,f_weight\n");
    for i in 0..40 {
        let x = 2.0 + (i % 10) as f64 * 0.5;
        let y = 300.0 + (i % 8) as f64 * 100.0;
        writeln!(sig, "{x},{y},0.5").unwrap();
    }
    std::fs::write(dir.join("sig.csv"), sig).unwrap();

    let mut bkg = String::from("f_deltajj,f_massjj,f_weight\n");
    for i in 0..60 {
        let x = (i % 12) as f64 * 0.3;
        let y = (i % 15) as f64 * 40.0;
        writeln!(bkg, "{x},{y},1.0").unwrap();
    }
    std::fs::write(dir.join("bkg.csv"), bkg).unwrap();

    std::fs::write(
        dir.join("rgs.cuts"),
        "# variable   direction\nf_deltajj  >\nf_massjj   >\n",
    )
    .unwrap();
}

fn config_text(extra: &str) -> String {
    format!(
        r#"
[search]
cuts = "rgs.cuts"
weight = "f_weight"
selection = "f_massjj>0"
reference = "sig.csv"
max_cuts = 20
output = "out/rgs.csv"
batch_size = 6

[[samples]]
path = "sig.csv"
tag = "_s"
start = 20
num_rows = 20

[[samples]]
path = "bkg.csv"
tag = "_b"

[ladder]
x = "f_deltajj"
y = "f_massjj"
bounds = [0.0, 8.0, 0.0, 1200.0]
{extra}
"#
    )
}

fn setup(extra: &str) -> (tempfile::TempDir, SearchConfig) {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let path: PathBuf = dir.path().join("search.toml");
    std::fs::write(&path, config_text(extra)).unwrap();
    let config = SearchConfig::from_file(&path).unwrap();
    (dir, config)
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn bdd_scenario_search_saves_results_and_manifest() {
    // GIVEN a signal and a background CSV with a two-variable cut definition
    let (_dir, config) = setup("");

    // WHEN the search runs and its artifacts are saved
    let outcome = run_search(&config, None, None).expect("search should succeed");
    let manifest_path = save_artifacts(&outcome).expect("artifacts should save");

    // THEN one row per cut-point is produced with both sample tags
    assert_eq!(outcome.store.len(), 20);
    assert_eq!(outcome.store.tags(), &["s".to_string(), "b".to_string()]);

    // AND preselection removed the background events with m_jj = 0
    let totals = outcome.store.totals().unwrap();
    assert_eq!(totals[0].entries, 20);
    assert_eq!(totals[1].entries, 56);
    assert_eq!(totals[0].weight, 10.0);

    // AND the saved table and manifest reload
    let (loaded, manifest) = load_artifacts(&config.search.output).unwrap();
    assert_eq!(loaded.rows(), outcome.store.rows());
    let manifest = manifest.expect("manifest should exist");
    assert!(manifest_path.ends_with("rgs.manifest.json"));
    assert_eq!(manifest.dataset_hash, outcome.prepared.dataset_hash);
    assert_eq!(manifest.dataset_hash.len(), 64);
    assert_eq!(manifest.cut_points, 20);
    assert_eq!(manifest.samples[1].tag, "b");
    assert_eq!(manifest.totals, totals.to_vec());
}

#[test]
fn bdd_scenario_rerun_is_byte_identical() {
    // GIVEN a search config
    let (dir, config) = setup("");

    // WHEN the search runs twice, once in parallel and once serially
    let first = run_search(&config, None, None).unwrap();
    first.store.save(&dir.path().join("a.csv")).unwrap();
    let mut serial = config.clone();
    serial.search.parallel = false;
    let second = run_search(&serial, None, None).unwrap();
    second.store.save(&dir.path().join("b.csv")).unwrap();

    // THEN the result files are identical, and so is the dataset hash
    assert_eq!(
        std::fs::read(dir.path().join("a.csv")).unwrap(),
        std::fs::read(dir.path().join("b.csv")).unwrap()
    );
    assert_eq!(first.prepared.dataset_hash, second.prepared.dataset_hash);
}

#[test]
fn bdd_scenario_best_cut_has_maximal_significance() {
    // GIVEN a completed search
    let (_dir, config) = setup("");
    let outcome = run_search(&config, None, None).unwrap();

    // WHEN the best cut is requested
    let best = find_best_cut(&outcome.store, "s", "b")
        .unwrap()
        .expect("non-empty results have a best cut");

    // THEN no row scores higher, and no earlier row scores the same
    let scorer = SignificanceScorer::new(&outcome.store, "s", "b").unwrap();
    for sc in scorer.scores() {
        assert!(sc.z <= best.z);
        if sc.row < best.row {
            assert!(sc.z < best.z);
        }
    }
    assert_eq!(best.variables, vec!["f_deltajj", "f_massjj"]);
}

#[test]
fn bdd_scenario_ladder_from_saved_results() {
    // GIVEN results saved by an earlier search
    let (_dir, config) = setup("");
    let outcome = run_search(&config, None, None).unwrap();
    save_artifacts(&outcome).unwrap();

    // WHEN the inputs are prepared again and the ladder is built from the file
    let prepared = prepare(&config).unwrap();
    let (store, _) = load_artifacts(&config.search.output).unwrap();
    let ladder_cfg = config.ladder.clone().unwrap();
    let report = build_ladder(&prepared, &store, &ladder_cfg).unwrap();

    // THEN the frontier is ordered by background fraction
    assert!(!report.frontier.is_empty());
    for pair in report.frontier.windows(2) {
        assert!(pair[0].fb <= pair[1].fb);
    }

    // AND the ladder keeps at least the signal of each of its steps
    assert!(!report.ladder.is_empty());
    for step in &report.ladder.steps {
        let single = store.counts(step.row, "s").unwrap();
        assert!(report.ladder.signal.unweighted >= single.unweighted);
    }

    // AND the default query is at least as significant as every prefix
    let mut k_cfg = ladder_cfg.clone();
    for k in 1..=report.frontier.len() {
        k_cfg.index = k;
        let prefix = build_ladder(&prepared, &store, &k_cfg).unwrap();
        assert!(report.ladder.z >= prefix.ladder.z);
    }
}

#[test]
fn bdd_scenario_apply_best_cut_matches_counts() {
    // GIVEN the best cut of a search
    let (_dir, config) = setup("");
    let outcome = run_search(&config, None, None).unwrap();
    let best = find_best_cut(&outcome.store, "s", "b").unwrap().unwrap();

    // WHEN it is applied to the registered samples
    let row = outcome.store.row(best.row).unwrap();
    let yields = apply_to_samples(&outcome.prepared, &[row.cut_point.clone()]).unwrap();

    // THEN the passing counts agree with the result row
    assert_eq!(yields.len(), 2);
    for (y, counts) in yields.iter().zip(&row.counts) {
        assert_eq!(y.counts.passed, counts.unweighted);
        assert_eq!(y.counts.passed_weight, counts.weighted);
    }
    assert_eq!(yields[1].tag, "b");
    assert_eq!(yields[1].counts.entries, 56);
}

#[test]
fn bdd_scenario_reordered_cut_definition_is_rejected_on_apply() {
    // GIVEN results saved by a search over (f_deltajj, f_massjj)
    let (dir, config) = setup("");
    let outcome = run_search(&config, None, None).unwrap();
    save_artifacts(&outcome).unwrap();
    let (store, _) = load_artifacts(&config.search.output).unwrap();

    // AND the saved row applies cleanly with the original definition
    let prepared = prepare(&config).unwrap();
    let yields = apply_store_row(&prepared, &store, 0).unwrap();
    assert_eq!(yields[0].counts.passed, store.rows()[0].counts[0].unweighted);

    // WHEN the cut definition is reordered and the inputs are prepared again
    std::fs::write(dir.path().join("rgs.cuts"), "f_massjj >\nf_deltajj >\n").unwrap();
    let reordered = prepare(&config).unwrap();

    // THEN applying a saved row fails instead of crossing the thresholds
    let err = apply_store_row(&reordered, &store, 0).unwrap_err();
    assert!(matches!(
        err,
        SearchError::Config(ConfigError::VariableMismatch { .. })
    ));

    // AND an out-of-range row is reported
    assert!(matches!(
        apply_store_row(&prepared, &store, 999),
        Err(SearchError::Config(ConfigError::Invalid(_)))
    ));
}

#[test]
fn bdd_scenario_exposure_scales_weights() {
    // GIVEN an exposure section: 20 of 40 signal rows stand for 6/fb at 3/fb
    let (_dir, config) = setup("\n[exposure]\ntarget = 6.0\nsample = 3.0\n");

    // WHEN the inputs are prepared
    let prepared = prepare(&config).unwrap();

    // THEN the signal scale is 6/3 × 40/20 = 4 and the background 6/3 × 60/60 = 2
    assert_eq!(prepared.sample("s").unwrap().weight_scale, 4.0);
    assert_eq!(prepared.sample("_b").unwrap().weight_scale, 2.0);
}

#[test]
fn bdd_scenario_missing_input_fails_with_path() {
    // GIVEN a config whose background file does not exist
    let (dir, mut config) = setup("");
    config.samples[1].path = dir.path().join("nope.csv");

    // WHEN the search runs
    let err = run_search(&config, None, None).unwrap_err();

    // THEN a data error naming the file is reported
    assert!(matches!(err, SearchError::Data(DataError::Io { .. })));
    assert!(err.to_string().contains("nope.csv"));
}

#[test]
fn bdd_scenario_unknown_variable_fails_before_counting() {
    // GIVEN a cut definition naming a column the tables lack
    let (dir, config) = setup("");
    std::fs::write(dir.path().join("rgs.cuts"), "f_deltajj >\nf_mjj >\n").unwrap();

    // WHEN the search runs
    let err = run_search(&config, None, None).unwrap_err();

    // THEN it fails with a missing-column error
    assert!(matches!(err, SearchError::Data(DataError::MissingColumn { .. })));
}

#[test]
fn bdd_scenario_bad_direction_symbol_is_config_error() {
    // GIVEN a cut definition with an unknown direction
    let (dir, config) = setup("");
    std::fs::write(dir.path().join("rgs.cuts"), "f_deltajj >=\n").unwrap();

    // WHEN the search runs
    let err = run_search(&config, None, None).unwrap_err();

    // THEN it is a config error
    assert!(matches!(
        err,
        SearchError::Config(ConfigError::UnknownDirection { line: 1, .. })
    ));
}

#[test]
fn bdd_scenario_cancelled_search_reports_partial_rows() {
    // GIVEN a search and a cancellation flag raised after the first batch
    let (_dir, config) = setup("");
    let cancel = AtomicBool::new(false);
    let progress = |done: usize, _total: usize| {
        if done >= 6 {
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    };

    // WHEN the search runs
    let err = run_search(&config, Some(&progress), Some(&cancel)).unwrap_err();

    // THEN it stops between batches with the completed rows
    match err {
        SearchError::Engine(EngineError::Cancelled {
            completed, partial, ..
        }) => {
            assert_eq!(completed, 6);
            assert_eq!(partial.len(), 6);
        }
        other => panic!("expected cancellation, got {other}"),
    }
}
