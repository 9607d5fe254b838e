//! RGS CLI — random grid search for optimal cuts.
//!
//! Commands:
//! - `search` — count every cut-point on the samples and save the result table
//! - `best` — report the single cut-point with the highest significance
//! - `ladder` — build the outer hull over saved results and pick a ladder
//! - `apply` — apply a cut-point or ladder to the configured samples

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use rgs_core::engine::DEFAULT_BATCH_SIZE;
use rgs_runner::config::DEFAULT_TREE;
use rgs_runner::export::export_ladder_csv;
use rgs_runner::{
    apply_store_row, apply_to_samples, build_ladder, check_store_variables, find_best_cut,
    load_artifacts, prepare, run_search, save_artifacts, ExposureConfig, LadderReport,
    SampleConfig, SampleYield, SearchConfig, SearchSection,
};

#[derive(Parser)]
#[command(name = "rgs", about = "RGS CLI — random grid search for cut optimization")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a grid search from a TOML config or from explicit inputs.
    Search {
        /// Path to a TOML search config (exclusive with the input flags below).
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        inputs: ExplicitInputs,
    },
    /// Report the cut-point with the highest significance in a result table.
    Best {
        /// Result table written by `search`.
        #[arg(long)]
        results: PathBuf,

        #[arg(long, default_value = "s")]
        signal_tag: String,

        #[arg(long, default_value = "b")]
        background_tag: String,
    },
    /// Build a ladder over saved results using the config's [ladder] section.
    Ladder {
        /// TOML search config with a [ladder] section.
        #[arg(long)]
        config: PathBuf,

        /// Result table. Defaults to `search.output` of the config.
        #[arg(long)]
        results: Option<PathBuf>,

        /// 0 = best ladder, k = first k hull points (overrides the config).
        #[arg(long)]
        index: Option<usize>,

        /// Shortest ladder reaching this significance (overrides the config).
        #[arg(long)]
        target_z: Option<f64>,

        /// Write the ladder steps to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Apply a cut-point or ladder to the configured samples and report yields.
    Apply {
        /// TOML search config.
        #[arg(long)]
        config: PathBuf,

        /// Result table. Defaults to `search.output` of the config.
        #[arg(long)]
        results: Option<PathBuf>,

        /// Apply the cut-point of this result row.
        #[arg(long)]
        row: Option<usize>,

        /// Apply the ladder selected by the config's [ladder] section.
        #[arg(long, default_value_t = false)]
        ladder: bool,

        #[arg(long, default_value = "s")]
        signal_tag: String,

        #[arg(long, default_value = "b")]
        background_tag: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Search { config, inputs } => {
            let search_config = match config {
                Some(path) => {
                    if inputs.has_inputs() {
                        bail!("--config is exclusive with --signal, --background and --cuts");
                    }
                    let mut c = SearchConfig::from_file(&path)
                        .with_context(|| format!("failed to load {}", path.display()))?;
                    if inputs.serial {
                        c.search.parallel = false;
                    }
                    c
                }
                None => inputs.into_config()?,
            };
            run_search_cmd(&search_config)
        }
        Commands::Best {
            results,
            signal_tag,
            background_tag,
        } => run_best_cmd(&results, &signal_tag, &background_tag),
        Commands::Ladder {
            config,
            results,
            index,
            target_z,
            csv,
        } => run_ladder_cmd(&config, results.as_deref(), index, target_z, csv.as_deref()),
        Commands::Apply {
            config,
            results,
            row,
            ladder,
            signal_tag,
            background_tag,
        } => run_apply_cmd(
            &config,
            results.as_deref(),
            row,
            ladder,
            &signal_tag,
            &background_tag,
        ),
    }
}

// ─── search ─────────────────────────────────────────────────────────

/// The flag form of `search`.
///
/// `--start` and `--num-rows` apply to both samples unless a
/// `--signal-*`/`--background-*` flag overrides them for one sample.
#[derive(Args)]
struct ExplicitInputs {
    /// Signal table (CSV, Parquet, or a directory holding <tree>.csv/.parquet).
    #[arg(long)]
    signal: Option<PathBuf>,

    /// Background table.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Cut-definition file.
    #[arg(long)]
    cuts: Option<PathBuf>,

    /// Table to read cut-points from. Defaults to the signal table.
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Tree (table) name inside a directory source.
    #[arg(long, default_value = DEFAULT_TREE)]
    tree: String,

    /// Weight column; events weigh 1.0 when absent.
    #[arg(long)]
    weight: Option<String>,

    /// Preselection, e.g. "f_massjj>0".
    #[arg(long)]
    selection: Option<String>,

    /// First row used for cut-points and for both samples.
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Events used per sample. Defaults to the rest of each table.
    #[arg(long)]
    num_rows: Option<usize>,

    /// First signal row (overrides --start for the signal sample).
    #[arg(long)]
    signal_start: Option<usize>,

    /// First background row (overrides --start for the background sample).
    #[arg(long)]
    background_start: Option<usize>,

    /// Signal events used (overrides --num-rows).
    #[arg(long)]
    signal_rows: Option<usize>,

    /// Background events used (overrides --num-rows).
    #[arg(long)]
    background_rows: Option<usize>,

    /// Fixed signal weight scale (overrides the exposure-derived scale).
    #[arg(long)]
    signal_scale: Option<f64>,

    /// Fixed background weight scale (overrides the exposure-derived scale).
    #[arg(long)]
    background_scale: Option<f64>,

    /// Maximum number of cut-points.
    #[arg(long, default_value_t = 10_000)]
    max_cuts: usize,

    /// Target integrated exposure.
    #[arg(long)]
    lumi: Option<f64>,

    /// Integrated exposure a full sample corresponds to (required with --lumi).
    #[arg(long)]
    sample_lumi: Option<f64>,

    /// Result table (.csv or .parquet).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Count cut-points on one thread.
    #[arg(long, default_value_t = false)]
    serial: bool,
}

impl ExplicitInputs {
    fn has_inputs(&self) -> bool {
        self.signal.is_some() || self.background.is_some() || self.cuts.is_some()
    }

    fn into_config(self) -> Result<SearchConfig> {
        let (Some(signal), Some(background), Some(cuts)) = (self.signal, self.background, self.cuts)
        else {
            bail!("either --config or all of --signal, --background and --cuts are required");
        };

        let exposure = match (self.lumi, self.sample_lumi) {
            (Some(target), Some(sample)) => Some(ExposureConfig { target, sample }),
            (None, None) => None,
            _ => bail!("--lumi and --sample-lumi must be given together"),
        };

        let samples = vec![
            SampleConfig {
                path: signal.clone(),
                tag: Some("s".to_string()),
                start: self.signal_start.unwrap_or(self.start),
                num_rows: self.signal_rows.or(self.num_rows),
                weight_scale: self.signal_scale,
                selection: None,
            },
            SampleConfig {
                path: background,
                tag: Some("b".to_string()),
                start: self.background_start.unwrap_or(self.start),
                num_rows: self.background_rows.or(self.num_rows),
                weight_scale: self.background_scale,
                selection: None,
            },
        ];

        let config = SearchConfig {
            search: SearchSection {
                cuts,
                tree: self.tree,
                weight: self.weight,
                selection: self.selection,
                reference: self.reference.unwrap_or(signal),
                cut_start: self.start,
                max_cuts: self.max_cuts,
                output: self.output.unwrap_or_else(|| PathBuf::from("rgs.csv")),
                parallel: !self.serial,
                batch_size: DEFAULT_BATCH_SIZE,
            },
            exposure,
            samples,
            ladder: None,
        };
        config.validate()?;
        Ok(config)
    }
}

fn run_search_cmd(config: &SearchConfig) -> Result<()> {
    let progress = |completed: usize, total: usize| {
        info!(completed, total, "counting");
    };
    let outcome = run_search(config, Some(&progress), None)?;
    let manifest = save_artifacts(&outcome)?;

    println!();
    println!("=== Grid Search ===");
    println!("Cut-points:     {}", outcome.store.len());
    println!("Variables:      {}", outcome.store.variables().join(", "));
    for info in &outcome.prepared.samples {
        println!(
            "Sample {:<8} {} rows from {} (weight scale {:.4})",
            info.tag, info.num_rows, info.path, info.weight_scale
        );
    }
    println!("Dataset hash:   {}", outcome.prepared.dataset_hash);
    println!("Results:        {}", config.search.output.display());
    println!("Manifest:       {}", manifest.display());
    println!();
    Ok(())
}

// ─── best ───────────────────────────────────────────────────────────

fn run_best_cmd(results: &Path, signal_tag: &str, background_tag: &str) -> Result<()> {
    let (store, _) = load_artifacts(results)?;
    let Some(best) = find_best_cut(&store, signal_tag, background_tag)? else {
        println!("No cut-points in {}", results.display());
        return Ok(());
    };

    println!();
    println!("=== Best Cut ===");
    println!("Row:            {}", best.row);
    println!("Z:              {:.4}", best.z);
    for (name, t) in best.variables.iter().zip(&best.thresholds) {
        println!("  {name:<20} {t}");
    }
    println!(
        "Signal:         {:.4} ({} events, fraction {:.4})",
        best.signal.weighted, best.signal.unweighted, best.signal.fraction
    );
    println!(
        "Background:     {:.4} ({} events, fraction {:.4})",
        best.background.weighted, best.background.unweighted, best.background.fraction
    );
    println!();
    Ok(())
}

// ─── ladder ─────────────────────────────────────────────────────────

fn ladder_report(
    config: &SearchConfig,
    results: Option<&Path>,
    index: Option<usize>,
    target_z: Option<f64>,
) -> Result<(rgs_runner::PreparedSearch, LadderReport)> {
    let Some(mut ladder_cfg) = config.ladder.clone() else {
        bail!("the config has no [ladder] section");
    };
    if let Some(k) = index {
        ladder_cfg.index = k;
        ladder_cfg.target_z = None;
    }
    if target_z.is_some() {
        ladder_cfg.target_z = target_z;
    }

    let results = results.unwrap_or(config.search.output.as_path());
    let (store, _) = load_artifacts(results)?;
    let prepared = prepare(config)?;
    let report = build_ladder(&prepared, &store, &ladder_cfg)?;
    Ok((prepared, report))
}

fn run_ladder_cmd(
    config_path: &Path,
    results: Option<&Path>,
    index: Option<usize>,
    target_z: Option<f64>,
    csv: Option<&Path>,
) -> Result<()> {
    let config = SearchConfig::from_file(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let (prepared, report) = ladder_report(&config, results, index, target_z)?;

    println!();
    println!("=== Ladder ({} vs {}) ===", report.x, report.y);
    println!("Hull points:    {}", report.frontier.len());
    println!("Steps:          {}", report.ladder.len());
    println!("Z:              {:.4}", report.ladder.z);
    println!(
        "Signal:         {:.4} ({} events)",
        report.ladder.signal.weighted, report.ladder.signal.unweighted
    );
    println!(
        "Background:     {:.4} ({} events)",
        report.ladder.background.weighted, report.ladder.background.unweighted
    );
    println!();
    println!(
        "{:>4} {:>8} {:>10} {:>12} {:>12}",
        "Step", "Row", "Z", "+Signal", "+Background"
    );
    println!("{}", "-".repeat(50));
    for (i, step) in report.ladder.steps.iter().enumerate() {
        println!(
            "{:>4} {:>8} {:>10.4} {:>12.4} {:>12.4}",
            i + 1,
            step.row,
            step.z,
            step.signal.weighted,
            step.background.weighted
        );
    }
    println!();

    if let Some(path) = csv {
        let (Some(x), Some(y)) = (
            prepared.spec.index_of(&report.x),
            prepared.spec.index_of(&report.y),
        ) else {
            bail!("ladder variables are not in the cut definition");
        };
        let text = export_ladder_csv(&report, x, y)?;
        std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Ladder saved to: {}", path.display());
    }
    Ok(())
}

// ─── apply ──────────────────────────────────────────────────────────

fn run_apply_cmd(
    config_path: &Path,
    results: Option<&Path>,
    row: Option<usize>,
    ladder: bool,
    signal_tag: &str,
    background_tag: &str,
) -> Result<()> {
    let config = SearchConfig::from_file(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if ladder && row.is_some() {
        bail!("--row and --ladder are mutually exclusive");
    }

    if ladder {
        let (prepared, report) = ladder_report(&config, results, None, None)?;
        let label = format!("ladder of {} cut-points", report.ladder.len());
        let yields = apply_to_samples(&prepared, &report.ladder.cut_points())?;
        print_yields(&label, &yields);
        return Ok(());
    }

    let results = results.unwrap_or(config.search.output.as_path());
    let (store, _) = load_artifacts(results)?;
    let prepared = prepare(&config)?;
    check_store_variables(&prepared, &store)
        .with_context(|| format!("{} does not match the cut definition", results.display()))?;
    let index = match row {
        Some(r) => r,
        None => match find_best_cut(&store, signal_tag, background_tag)? {
            Some(best) => best.row,
            None => bail!("no cut-points in {}", results.display()),
        },
    };
    let yields = apply_store_row(&prepared, &store, index)?;
    print_yields(&format!("row {index}"), &yields);
    Ok(())
}

fn print_yields(label: &str, yields: &[SampleYield]) {
    println!();
    println!("=== Yields ({label}) ===");
    println!(
        "{:<8} {:>10} {:>14} {:>10} {:>14}",
        "Sample", "Entries", "Weight", "Passed", "Passed weight"
    );
    println!("{}", "-".repeat(60));
    for y in yields {
        println!(
            "{:<8} {:>10} {:>14.4} {:>10} {:>14.4}",
            y.tag, y.counts.entries, y.counts.weight, y.counts.passed, y.counts.passed_weight
        );
    }
    println!();
}
