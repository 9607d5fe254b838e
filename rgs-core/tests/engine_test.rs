//! Engine integration tests: counts, row order, determinism, persistence.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rgs_core::cuts::{CutPointSet, CutSpec, Selection};
use rgs_core::data::EventTable;
use rgs_core::engine::{EngineError, RgsEngine, RunOptions, Sample};
use rgs_core::results::ResultStore;

// ── Helpers ──────────────────────────────────────────────────────────

fn table(name: &str, deltajj: Vec<f64>, massjj: Vec<f64>) -> Arc<EventTable> {
    Arc::new(
        EventTable::from_columns(
            name,
            vec![("f_deltajj".into(), deltajj), ("f_massjj".into(), massjj)],
            Some("weight"),
        )
        .unwrap(),
    )
}

/// Ten unit-weight events: six pass (1, 100), two of those pass (3, 400).
fn background() -> Arc<EventTable> {
    table(
        "bkg",
        vec![1.5, 2.0, 2.5, 4.0, 5.0, 1.2, 0.5, 0.9, 3.5, 0.1],
        vec![150.0, 200.0, 300.0, 500.0, 450.0, 120.0, 900.0, 50.0, 50.0, 10.0],
    )
}

fn reference() -> Arc<EventTable> {
    table("sig", vec![1.0, 3.0], vec![100.0, 400.0])
}

fn spec() -> CutSpec {
    CutSpec::parse("f_deltajj >\nf_massjj >\n").unwrap()
}

/// A larger, irregular sample for determinism checks.
fn noisy(name: &str, n: usize, seed: u64) -> Arc<EventTable> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let mut d = Vec::with_capacity(n);
    let mut m = Vec::with_capacity(n);
    let mut w = Vec::with_capacity(n);
    for _ in 0..n {
        d.push(next() * 6.0);
        m.push(next() * 1000.0);
        w.push(0.1 + next());
    }
    Arc::new(
        EventTable::from_columns(
            name,
            vec![("f_deltajj".into(), d), ("f_massjj".into(), m), ("weight".into(), w)],
            Some("weight"),
        )
        .unwrap(),
    )
}

fn noisy_engine() -> RgsEngine {
    let spec = spec();
    let sig = noisy("sig", 300, 7);
    let bkg = noisy("bkg", 500, 11);
    let grid = CutPointSet::generate(&spec, &sig, 0, 200).unwrap();
    let mut engine = RgsEngine::new(grid);
    engine.add(sig, 200, 100, Some("s"), 0.5).unwrap();
    engine.add(bkg, 0, 500, Some("b"), 2.0).unwrap();
    engine
}

// ── Counting ─────────────────────────────────────────────────────────

#[test]
fn two_cut_points_on_ten_background_events() {
    let spec = spec();
    let grid = CutPointSet::generate(&spec, &reference(), 0, 10).unwrap();
    assert_eq!(grid.len(), 2);

    let mut engine = RgsEngine::new(grid);
    let tag = engine.add(background(), 0, 10, Some("_b"), 1.0).unwrap();
    assert_eq!(tag, "b");

    let store = engine.run(&spec).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.row(0).unwrap().cut_point.thresholds(), &[1.0, 100.0]);
    assert_eq!(store.row(1).unwrap().cut_point.thresholds(), &[3.0, 400.0]);
    assert_eq!(store.value(0, "count_b"), Some(6.0));
    assert_eq!(store.value(1, "count_b"), Some(2.0));
    assert_eq!(store.value(0, "fraction_b"), Some(0.6));
    assert_eq!(store.value(1, "fraction_b"), Some(0.2));
}

#[test]
fn untagged_samples_are_numbered() {
    let spec = spec();
    let grid = CutPointSet::generate(&spec, &reference(), 0, 10).unwrap();
    let mut engine = RgsEngine::new(grid);
    engine.add(reference(), 0, 2, None, 1.0).unwrap();
    engine.add(background(), 0, 10, None, 1.0).unwrap();
    let store = engine.run(&spec).unwrap();
    assert_eq!(store.tags(), &["0".to_string(), "1".to_string()]);
    assert!(store.column_names().contains(&"count_1".to_string()));
}

#[test]
fn preselected_sample_drops_rows_from_totals() {
    let spec = spec();
    let grid = CutPointSet::generate(&spec, &reference(), 0, 10).unwrap();
    let mut engine = RgsEngine::new(grid);
    engine
        .add_sample(
            Sample::new(background())
                .tag("b")
                .selection(Selection::parse("f_massjj > 100").unwrap()),
        )
        .unwrap();
    let store = engine.run(&spec).unwrap();
    let totals = store.totals().unwrap();
    assert_eq!(totals[0].entries, 7);
    assert_eq!(store.value(0, "count_b"), Some(6.0));
    assert_eq!(store.value(0, "fraction_b"), Some(6.0 / 7.0));
}

#[test]
fn empty_grid_gives_empty_store() {
    let spec = spec();
    let grid = CutPointSet::generate(&spec, &reference(), 2, 10).unwrap();
    let mut engine = RgsEngine::new(grid);
    engine.add(background(), 0, 10, Some("b"), 1.0).unwrap();
    let store = engine.run(&spec).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.tags(), &["b".to_string()]);
}

#[test]
fn missing_column_fails_before_counting() {
    let spec = CutSpec::parse("f_deltajj >\nf_mjj >\n").unwrap();
    let err = CutPointSet::generate(&spec, &reference(), 0, 10).unwrap_err();
    assert!(err.to_string().contains("f_mjj"));
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn serial_and_parallel_runs_agree() {
    let engine = noisy_engine();
    let spec = spec();
    let serial = engine
        .run_with(
            &spec,
            &RunOptions {
                parallel: false,
                batch_size: 7,
                ..RunOptions::default()
            },
        )
        .unwrap();
    let parallel = engine.run(&spec).unwrap();
    assert_eq!(serial, parallel);
}

#[test]
fn repeated_runs_write_identical_csv() {
    let engine = noisy_engine();
    let spec = spec();
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.csv");
    let b = dir.path().join("b.csv");
    engine.run(&spec).unwrap().save(&a).unwrap();
    engine.run(&spec).unwrap().save(&b).unwrap();
    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());

    let loaded = ResultStore::load(&a).unwrap();
    assert_eq!(loaded.len(), 200);
    assert_eq!(loaded.tags(), &["s".to_string(), "b".to_string()]);
}

#[test]
fn cancellation_keeps_completed_rows_in_order() {
    let engine = noisy_engine();
    let spec = spec();
    let full = engine.run(&spec).unwrap();

    let cancel = AtomicBool::new(false);
    let progress = |done: usize, _total: usize| {
        if done >= 50 {
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    };
    let err = engine
        .run_with(
            &spec,
            &RunOptions {
                batch_size: 25,
                parallel: true,
                progress: Some(&progress),
                cancel: Some(&cancel),
            },
        )
        .unwrap_err();

    match err {
        EngineError::Cancelled {
            completed,
            total,
            partial,
        } => {
            assert_eq!(completed, 50);
            assert_eq!(total, 200);
            assert_eq!(partial.rows(), &full.rows()[..50]);
        }
        other => panic!("expected cancellation, got {other}"),
    }
}
