//! Serializable search configuration (TOML).
//!
//! ```toml
//! [search]
//! cuts = "rgs.cuts"
//! tree = "Analysis"
//! weight = "f_weight"
//! selection = "f_massjj>0"
//! reference = "data/vbf.csv"
//! max_cuts = 10000
//! output = "rgs.csv"
//!
//! [exposure]
//! target = 300.0
//! sample = 2.8
//!
//! [[samples]]
//! path = "data/vbf.csv"
//! tag = "s"
//! num_rows = 10000
//!
//! [[samples]]
//! path = "data/ggf.csv"
//! tag = "b"
//! num_rows = 10000
//!
//! [ladder]
//! x = "f_deltajj"
//! y = "f_massjj"
//! bounds = [0.0, 8.0, 0.0, 5000.0]
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rgs_core::cuts::{ConfigError, Selection};
use rgs_core::engine::DEFAULT_BATCH_SIZE;
use rgs_core::hull::{Bounds, HullConfig};

/// Default tree (table) name inside a directory source.
pub const DEFAULT_TREE: &str = "Analysis";

/// Full description of one search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    pub search: SearchSection,
    #[serde(default)]
    pub exposure: Option<ExposureConfig>,
    pub samples: Vec<SampleConfig>,
    #[serde(default)]
    pub ladder: Option<LadderConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchSection {
    /// Cut-definition file.
    pub cuts: PathBuf,
    #[serde(default = "default_tree")]
    pub tree: String,
    /// Weight column; events weigh 1.0 where it is absent.
    #[serde(default)]
    pub weight: Option<String>,
    /// Preselection applied to the reference sample and every counted sample
    /// without a selection of its own.
    #[serde(default)]
    pub selection: Option<String>,
    /// Table the cut-points are read from.
    pub reference: PathBuf,
    #[serde(default)]
    pub cut_start: usize,
    pub max_cuts: usize,
    pub output: PathBuf,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Integrated exposure used to re-normalize sample weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExposureConfig {
    /// Exposure the results should correspond to.
    pub target: f64,
    /// Exposure each full sample corresponds to.
    pub sample: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub start: usize,
    /// `None` = to the end of the table.
    #[serde(default)]
    pub num_rows: Option<usize>,
    /// Overrides the exposure-derived scale.
    #[serde(default)]
    pub weight_scale: Option<f64>,
    #[serde(default)]
    pub selection: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LadderConfig {
    pub x: String,
    pub y: String,
    /// `[xmin, xmax, ymin, ymax]`
    pub bounds: [f64; 4],
    #[serde(default = "default_signal")]
    pub signal: String,
    #[serde(default = "default_background")]
    pub background: String,
    /// 0 = best ladder, k = first k hull points.
    #[serde(default)]
    pub index: usize,
    /// Stop at the first prefix reaching this Z (takes precedence over `index`).
    ///
    /// Z is on the scale of [`rgs_core::significance()`], which reads √2 higher
    /// than the textbook Asimov value `√(2((s+b)ln(1+s/b) − s))`. Divide a
    /// textbook target by √2 before using it here.
    #[serde(default)]
    pub target_z: Option<f64>,
}

fn default_tree() -> String {
    DEFAULT_TREE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_signal() -> String {
    "s".to_string()
}

fn default_background() -> String {
    "b".to_string()
}

impl LadderConfig {
    pub fn hull_config(&self) -> HullConfig {
        let [xmin, xmax, ymin, ymax] = self.bounds;
        HullConfig {
            x: self.x.clone(),
            y: self.y.clone(),
            bounds: Bounds::new(xmin, xmax, ymin, ymax),
            signal_tag: self.signal.clone(),
            background_tag: self.background.clone(),
        }
    }
}

impl SearchConfig {
    /// Load, resolve relative paths, and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate; paths are left as written.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::Invalid(format!("parse search TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("serialize search config: {e}")))
    }

    /// Join relative paths onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.search.cuts);
        join(&mut self.search.reference);
        join(&mut self.search.output);
        for s in &mut self.samples {
            join(&mut s.path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.search.max_cuts == 0 {
            return invalid("search.max_cuts must be at least 1".into());
        }
        if self.search.batch_size == 0 {
            return invalid("search.batch_size must be at least 1".into());
        }
        if self.search.tree.trim().is_empty() {
            return invalid("search.tree must not be empty".into());
        }
        if self.samples.is_empty() {
            return invalid("at least one [[samples]] entry is required".into());
        }
        if let Some(sel) = &self.search.selection {
            Selection::parse(sel)?;
        }

        if let Some(exp) = &self.exposure {
            if !(exp.target.is_finite() && exp.target >= 0.0) {
                return invalid(format!("exposure.target must be >= 0, got {}", exp.target));
            }
            if !(exp.sample.is_finite() && exp.sample > 0.0) {
                return invalid(format!("exposure.sample must be > 0, got {}", exp.sample));
            }
        }

        let mut tags: Vec<&str> = Vec::new();
        for (i, s) in self.samples.iter().enumerate() {
            if let Some(tag) = s.tag.as_deref().map(|t| t.trim_start_matches('_')) {
                if tags.contains(&tag) {
                    return invalid(format!("samples[{i}]: duplicate tag '{tag}'"));
                }
                tags.push(tag);
            }
            if s.num_rows == Some(0) {
                return invalid(format!("samples[{i}]: num_rows must be at least 1"));
            }
            if let Some(w) = s.weight_scale {
                if !(w.is_finite() && w >= 0.0) {
                    return invalid(format!("samples[{i}]: weight_scale must be >= 0, got {w}"));
                }
            }
            if let Some(sel) = &s.selection {
                Selection::parse(sel)?;
            }
        }

        if let Some(ladder) = &self.ladder {
            if ladder.x == ladder.y {
                return invalid(format!("ladder.x and ladder.y are both '{}'", ladder.x));
            }
            if !ladder.hull_config().bounds.is_valid() {
                return invalid(format!("ladder.bounds {:?} is not a valid box", ladder.bounds));
            }
            for tag in [&ladder.signal, &ladder.background] {
                if !tags.contains(&tag.trim_start_matches('_')) {
                    return invalid(format!("ladder sample '{tag}' is not a tagged sample"));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[search]
cuts = "rgs.cuts"
reference = "sig.csv"
max_cuts = 100
output = "out/rgs.csv"

[[samples]]
path = "sig.csv"
tag = "s"

[[samples]]
path = "bkg.csv"
tag = "b"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let c = SearchConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(c.search.tree, DEFAULT_TREE);
        assert_eq!(c.search.batch_size, DEFAULT_BATCH_SIZE);
        assert!(c.search.parallel);
        assert_eq!(c.search.cut_start, 0);
        assert!(c.exposure.is_none());
        assert!(c.ladder.is_none());
        assert_eq!(c.samples[1].tag.as_deref(), Some("b"));
        assert_eq!(c.samples[1].num_rows, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = MINIMAL.replace("max_cuts = 100", "max_cuts = 100\nmaxcut = 3");
        let err = SearchConfig::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("maxcut"));
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let text = MINIMAL.replace("tag = \"b\"", "tag = \"_s\"");
        assert!(SearchConfig::from_toml(&text).is_err());
    }

    #[test]
    fn bad_selection_is_rejected() {
        let text = MINIMAL.replace("max_cuts = 100", "max_cuts = 100\nselection = \"f_massjj ~ 0\"");
        assert!(matches!(
            SearchConfig::from_toml(&text),
            Err(ConfigError::InvalidSelection { .. })
        ));
    }

    #[test]
    fn ladder_needs_tagged_samples() {
        let text = format!(
            "{MINIMAL}\n[ladder]\nx = \"a\"\ny = \"b\"\nbounds = [0.0, 1.0, 0.0, 1.0]\nbackground = \"bkg\"\n"
        );
        let err = SearchConfig::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("bkg"));
    }

    #[test]
    fn ladder_bounds_become_hull_config() {
        let text = format!("{MINIMAL}\n[ladder]\nx = \"a\"\ny = \"b\"\nbounds = [0.0, 8.0, 0.0, 5000.0]\n");
        let c = SearchConfig::from_toml(&text).unwrap();
        let hull = c.ladder.unwrap().hull_config();
        assert_eq!(hull.bounds.ymax, 5000.0);
        assert_eq!(hull.signal_tag, "s");
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let c = SearchConfig::from_file(&path).unwrap();
        assert_eq!(c.search.cuts, dir.path().join("rgs.cuts"));
        assert_eq!(c.samples[1].path, dir.path().join("bkg.csv"));
    }

    #[test]
    fn toml_roundtrip_keeps_values() {
        let c = SearchConfig::from_toml(MINIMAL).unwrap();
        let again = SearchConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(c, again);
    }
}
