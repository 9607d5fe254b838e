//! Cut definitions: which variables take part in the search and how each
//! one is cut.
//!
//! Format (one variable per line):
//!
//! ```text
//! # name        direction
//! f_deltajj     >
//! f_massjj      >
//! f_eta         |<
//! ```
//!
//! Direction symbols: `>`, `<`, `|>`, `|<`, `==`. Blank lines and lines
//! starting with `#` are ignored. Declaration order is the component order of
//! every cut-point and every result row.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Comment marker for cut-definition and selection text.
pub const COMMENT_MARKER: char = '#';

/// Errors raised while reading cut definitions, selections, or search configs.
///
/// All of these are fatal and reported before any counting starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("line {line}: expected `<name> <direction>`, got '{text}'")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: unknown cut direction '{symbol}' (expected one of >, <, |>, |<, ==)")]
    UnknownDirection { line: usize, symbol: String },

    #[error("line {line}: variable '{name}' declared twice")]
    DuplicateVariable { line: usize, name: String },

    #[error("cut definition declares no variables")]
    NoVariables,

    #[error("invalid selection '{expr}': {reason}")]
    InvalidSelection { expr: String, reason: String },

    #[error("cut-points were generated for {expected:?} but the run uses {actual:?}")]
    VariableMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How a single variable is cut against its threshold `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CutDirection {
    /// `x > t`
    Gt,
    /// `x < t`
    Lt,
    /// `|x| > t`
    AbsGt,
    /// `|x| < t`
    AbsLt,
    /// `x == t`
    Eq,
}

impl CutDirection {
    /// Parse a direction symbol from a cut-definition line.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            "|>" => Some(Self::AbsGt),
            "|<" => Some(Self::AbsLt),
            "==" => Some(Self::Eq),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::AbsGt => "|>",
            Self::AbsLt => "|<",
            Self::Eq => "==",
        }
    }

    /// Does a value pass this cut at `threshold`?
    #[inline]
    pub fn passes(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::AbsGt => value.abs() > threshold,
            Self::AbsLt => value.abs() < threshold,
            Self::Eq => value == threshold,
        }
    }
}

impl fmt::Display for CutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A search variable: column name plus cut direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub direction: CutDirection,
}

impl Variable {
    pub fn new(name: impl Into<String>, direction: CutDirection) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }

    /// Column name used for this variable's threshold in persisted results.
    pub fn cut_column(&self) -> String {
        format!("{}_cut", self.name)
    }
}

/// Ordered list of search variables, parsed from a cut-definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutSpec {
    variables: Vec<Variable>,
}

impl CutSpec {
    /// Build a spec from variables already in declaration order.
    pub fn new(variables: Vec<Variable>) -> Result<Self, ConfigError> {
        if variables.is_empty() {
            return Err(ConfigError::NoVariables);
        }
        let mut seen = HashSet::new();
        for (i, var) in variables.iter().enumerate() {
            if !seen.insert(var.name.as_str()) {
                return Err(ConfigError::DuplicateVariable {
                    line: i + 1,
                    name: var.name.clone(),
                });
            }
        }
        Ok(Self { variables })
    }

    /// Read and parse a cut-definition file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse cut-definition text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut variables = Vec::new();
        let mut seen = HashSet::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(COMMENT_MARKER) {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (name, symbol) = match (fields.next(), fields.next(), fields.next()) {
                (Some(name), Some(symbol), None) => (name, symbol),
                _ => {
                    return Err(ConfigError::MalformedLine {
                        line: idx + 1,
                        text: line.to_string(),
                    })
                }
            };

            let direction =
                CutDirection::from_symbol(symbol).ok_or_else(|| ConfigError::UnknownDirection {
                    line: idx + 1,
                    symbol: symbol.to_string(),
                })?;

            if !seen.insert(name.to_string()) {
                return Err(ConfigError::DuplicateVariable {
                    line: idx + 1,
                    name: name.to_string(),
                });
            }

            variables.push(Variable::new(name, direction));
        }

        if variables.is_empty() {
            return Err(ConfigError::NoVariables);
        }
        Ok(Self { variables })
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    pub fn directions(&self) -> Vec<CutDirection> {
        self.variables.iter().map(|v| v.direction).collect()
    }

    /// Position of a variable in declaration order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Render back to cut-definition text.
    pub fn to_text(&self) -> String {
        self.variables
            .iter()
            .map(|v| format!("{} {}\n", v.name, v.direction))
            .collect()
    }
}
