//! Cut-points and the candidate grid.
//!
//! A cut-point is one row of a reference sample read through the cut spec:
//! one threshold per declared variable. The grid is never sorted or
//! deduplicated, so the row index of a cut-point is stable across runs.

use serde::{Deserialize, Serialize};

use super::selection::Selection;
use super::spec::{CutDirection, CutSpec};
use crate::data::{DataError, EventTable};

/// Ordered thresholds, one per variable of the cut spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutPoint {
    thresholds: Vec<f64>,
}

impl CutPoint {
    pub fn new(thresholds: Vec<f64>) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// The box rule: every variable passes its cut.
    ///
    /// `values` and `directions` are in cut-spec order. A point whose length
    /// differs from `directions` accepts nothing.
    #[inline]
    pub fn accepts(&self, directions: &[CutDirection], values: &[f64]) -> bool {
        if self.thresholds.len() != directions.len() || values.len() != directions.len() {
            return false;
        }
        self.thresholds
            .iter()
            .zip(directions)
            .zip(values)
            .all(|((&t, &dir), &x)| dir.passes(x, t))
    }
}

impl CutSpec {
    /// Resolve every variable to a column index of `table`.
    pub fn bind(&self, table: &EventTable) -> Result<Vec<usize>, DataError> {
        self.variables()
            .iter()
            .map(|v| table.column_index(&v.name))
            .collect()
    }
}

/// The candidate grid: cut-points in generation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutPointSet {
    variables: Vec<String>,
    points: Vec<CutPoint>,
    /// Row of the reference table each cut-point was read from.
    source_rows: Vec<usize>,
}

impl CutPointSet {
    /// Read up to `max_points` cut-points from `reference`, starting at `start_row`.
    pub fn generate(
        spec: &CutSpec,
        reference: &EventTable,
        start_row: usize,
        max_points: usize,
    ) -> Result<Self, DataError> {
        Self::generate_selected(spec, reference, start_row, max_points, &Selection::all())
    }

    /// Like [`generate`](Self::generate), skipping reference rows that fail `selection`.
    ///
    /// The `max_points` limit counts accepted rows only.
    pub fn generate_selected(
        spec: &CutSpec,
        reference: &EventTable,
        start_row: usize,
        max_points: usize,
        selection: &Selection,
    ) -> Result<Self, DataError> {
        let columns = spec.bind(reference)?;
        let selection = selection.bind(reference)?;
        // A start past the end gives an empty grid.
        let rows = reference.row_range(start_row.min(reference.len()), None)?;

        let mut points = Vec::with_capacity(max_points.min(rows.len()));
        let mut source_rows = Vec::with_capacity(points.capacity());
        for row in rows {
            if points.len() >= max_points {
                break;
            }
            if !selection.accepts(reference, row) {
                continue;
            }
            let thresholds = columns.iter().map(|&c| reference.value(row, c)).collect();
            points.push(CutPoint::new(thresholds));
            source_rows.push(row);
        }

        Ok(Self {
            variables: spec.names(),
            points,
            source_rows,
        })
    }

    /// Build a grid from explicit cut-points.
    pub fn from_points(spec: &CutSpec, points: Vec<CutPoint>) -> Self {
        let source_rows = (0..points.len()).collect();
        Self {
            variables: spec.names(),
            points,
            source_rows,
        }
    }

    /// Variable names the thresholds are ordered by.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn points(&self) -> &[CutPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&CutPoint> {
        self.points.get(index)
    }

    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> CutSpec {
        CutSpec::parse("f_deltajj >\nf_massjj >\n").unwrap()
    }

    fn reference() -> EventTable {
        EventTable::from_columns(
            "sig",
            vec![
                ("f_massjj".into(), vec![100.0, 400.0, -1.0, 250.0]),
                ("f_deltajj".into(), vec![1.0, 3.0, 0.5, 2.0]),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn one_point_per_row_in_spec_order() {
        let set = CutPointSet::generate(&spec(), &reference(), 0, 2).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.points()[0].thresholds(), &[1.0, 100.0]);
        assert_eq!(set.points()[1].thresholds(), &[3.0, 400.0]);
        assert_eq!(set.variables(), &["f_deltajj", "f_massjj"]);
    }

    #[test]
    fn start_offset_and_short_table() {
        let set = CutPointSet::generate(&spec(), &reference(), 2, 100).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.source_rows(), &[2, 3]);
    }

    #[test]
    fn start_past_table_end_gives_empty_set() {
        let set = CutPointSet::generate(&spec(), &reference(), 50, 10).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.variables(), &["f_deltajj", "f_massjj"]);
    }

    #[test]
    fn selection_skips_rows_without_consuming_limit() {
        let sel = Selection::parse("f_massjj > 0").unwrap();
        let set = CutPointSet::generate_selected(&spec(), &reference(), 1, 2, &sel).unwrap();
        assert_eq!(set.source_rows(), &[1, 3]);
    }

    #[test]
    fn zero_limit_gives_empty_set() {
        let set = CutPointSet::generate(&spec(), &reference(), 0, 0).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn missing_variable_is_data_error() {
        let spec = CutSpec::parse("f_pt4l >\n").unwrap();
        assert!(matches!(
            CutPointSet::generate(&spec, &reference(), 0, 10),
            Err(DataError::MissingColumn { .. })
        ));
    }

    #[test]
    fn duplicates_are_kept() {
        let table = EventTable::from_columns(
            "sig",
            vec![
                ("f_deltajj".into(), vec![1.0, 1.0]),
                ("f_massjj".into(), vec![5.0, 5.0]),
            ],
            None,
        )
        .unwrap();
        let set = CutPointSet::generate(&spec(), &table, 0, 10).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.points()[0], set.points()[1]);
    }

    #[test]
    fn box_rule_is_and() {
        let p = CutPoint::new(vec![1.0, 100.0]);
        let dirs = [CutDirection::Gt, CutDirection::Gt];
        assert!(p.accepts(&dirs, &[1.5, 150.0]));
        assert!(!p.accepts(&dirs, &[1.5, 50.0]));
        assert!(!p.accepts(&dirs, &[0.5, 150.0]));
    }

    #[test]
    fn mismatched_lengths_accept_nothing() {
        let dirs = [CutDirection::Gt, CutDirection::Gt];
        assert!(!CutPoint::new(vec![1.0]).accepts(&dirs, &[1.5, 150.0]));
        assert!(!CutPoint::new(vec![]).accepts(&dirs, &[1.5, 150.0]));
        assert!(!CutPoint::new(vec![1.0, 100.0]).accepts(&dirs, &[1.5]));
    }
}
