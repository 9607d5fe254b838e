//! Cut definitions, preselection, and the candidate cut-point grid.

pub mod point;
pub mod selection;
pub mod spec;

pub use point::{CutPoint, CutPointSet};
pub use selection::{BoundSelection, CompareOp, Selection};
pub use spec::{ConfigError, CutDirection, CutSpec, Variable, COMMENT_MARKER};
