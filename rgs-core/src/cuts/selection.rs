//! Preselection applied to a sample before cut-points are generated or events
//! are counted (e.g. `f_massjj>0` to require two jets).
//!
//! Grammar: `term (&& term)*` with `term := name op number` and
//! `op ∈ {>, >=, <, <=, ==, !=}`. An empty expression accepts everything.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::spec::ConfigError;
use crate::data::{DataError, EventTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    #[inline]
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Term {
    column: String,
    op: CompareOp,
    value: f64,
}

/// A parsed (but not yet bound) preselection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    terms: Vec<Term>,
}

impl Selection {
    /// Selection that accepts every event.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidSelection {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        if expr.trim().is_empty() {
            return Ok(Self::all());
        }

        let mut terms = Vec::new();
        for part in expr.split("&&") {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid("empty term"));
            }

            let op_start = part
                .find(['<', '>', '=', '!'])
                .ok_or_else(|| invalid("missing comparison operator"))?;
            let rest = &part[op_start..];
            let (op, op_len) = if rest.starts_with(">=") {
                (CompareOp::Ge, 2)
            } else if rest.starts_with("<=") {
                (CompareOp::Le, 2)
            } else if rest.starts_with("==") {
                (CompareOp::Eq, 2)
            } else if rest.starts_with("!=") {
                (CompareOp::Ne, 2)
            } else if rest.starts_with('>') {
                (CompareOp::Gt, 1)
            } else if rest.starts_with('<') {
                (CompareOp::Lt, 1)
            } else {
                return Err(invalid("unknown comparison operator"));
            };

            let column = part[..op_start].trim();
            if column.is_empty() || column.contains(char::is_whitespace) {
                return Err(invalid("bad variable name"));
            }
            let value: f64 = rest[op_len..]
                .trim()
                .parse()
                .map_err(|_| invalid("right-hand side is not a number"))?;

            terms.push(Term {
                column: column.to_string(),
                op,
                value,
            });
        }

        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Resolve column names against a table once, so evaluation is by index.
    pub fn bind(&self, table: &EventTable) -> Result<BoundSelection, DataError> {
        let terms = self
            .terms
            .iter()
            .map(|t| Ok((table.column_index(&t.column)?, t.op, t.value)))
            .collect::<Result<Vec<_>, DataError>>()?;
        Ok(BoundSelection { terms })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|t| format!("{}{}{}", t.column, t.op.symbol(), t.value))
            .collect();
        f.write_str(&parts.join(" && "))
    }
}

/// A selection with column indexes resolved against one table.
#[derive(Debug, Clone)]
pub struct BoundSelection {
    terms: Vec<(usize, CompareOp, f64)>,
}

impl BoundSelection {
    #[inline]
    pub fn accepts(&self, table: &EventTable, row: usize) -> bool {
        self.terms
            .iter()
            .all(|&(col, op, value)| op.apply(table.value(row, col), value))
    }
}
