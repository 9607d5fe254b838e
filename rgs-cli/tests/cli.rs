//! End-to-end runs of the `rgs` binary.

use std::path::Path;
use std::process::Command;

fn rgs() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rgs"))
}

fn write_inputs(dir: &Path) {
    std::fs::write(
        dir.join("sig.csv"),
        "x,y\n3.0,400.0\n4.0,500.0\n2.5,350.0\n5.0,700.0\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("bkg.csv"),
        "x,y\n0.5,50.0\n1.0,100.0\n3.5,450.0\n0.2,20.0\n",
    )
    .unwrap();
    std::fs::write(dir.join("rgs.cuts"), "x >\ny >\n").unwrap();
}

#[test]
fn search_then_best() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let out = dir.path().join("rgs.csv");

    let status = rgs()
        .arg("search")
        .arg("--signal")
        .arg(dir.path().join("sig.csv"))
        .arg("--background")
        .arg(dir.path().join("bkg.csv"))
        .arg("--cuts")
        .arg(dir.path().join("rgs.cuts"))
        .arg("--output")
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(out.is_file());
    assert!(dir.path().join("rgs.manifest.json").is_file());

    let output = rgs().arg("best").arg("--results").arg(&out).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Best Cut"));
}

#[test]
fn missing_signal_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let output = rgs()
        .arg("search")
        .arg("--signal")
        .arg(dir.path().join("missing.csv"))
        .arg("--background")
        .arg(dir.path().join("bkg.csv"))
        .arg("--cuts")
        .arg(dir.path().join("rgs.cuts"))
        .arg("--output")
        .arg(dir.path().join("rgs.csv"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.csv"));
}

#[test]
fn config_and_flags_are_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let output = rgs()
        .arg("search")
        .arg("--config")
        .arg(dir.path().join("search.toml"))
        .arg("--signal")
        .arg(dir.path().join("sig.csv"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("exclusive"));
}

#[test]
fn per_sample_row_flags_limit_each_window() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let output = rgs()
        .arg("search")
        .arg("--signal")
        .arg(dir.path().join("sig.csv"))
        .arg("--background")
        .arg(dir.path().join("bkg.csv"))
        .arg("--cuts")
        .arg(dir.path().join("rgs.cuts"))
        .args(["--signal-rows", "2", "--background-start", "1", "--background-rows", "3"])
        .arg("--output")
        .arg(dir.path().join("rgs.csv"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 rows from"));
    assert!(stdout.contains("3 rows from"));
}
