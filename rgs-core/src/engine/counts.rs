//! Per-sample pass counts.

use serde::{Deserialize, Serialize};

/// Pass counts of one cut-point on one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleCounts {
    /// Number of events passing (no weights).
    pub unweighted: u64,
    /// Sum of scaled weights of passing events.
    pub weighted: f64,
    /// `weighted / total weight`, or 0 when the sample has no weight.
    pub fraction: f64,
}

impl SampleCounts {
    pub fn new(unweighted: u64, weighted: f64, total_weight: f64) -> Self {
        Self {
            unweighted,
            weighted,
            fraction: fraction(weighted, total_weight),
        }
    }

    pub fn zero() -> Self {
        Self {
            unweighted: 0,
            weighted: 0.0,
            fraction: 0.0,
        }
    }
}

/// Totals of one registered sample (events surviving preselection).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleTotals {
    pub entries: u64,
    pub weight: f64,
}

/// Weighted fraction with 0/0 defined as 0.
#[inline]
pub fn fraction(weighted: f64, total: f64) -> f64 {
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_weight_gives_zero_fraction() {
        let c = SampleCounts::new(0, 0.0, 0.0);
        assert_eq!(c.fraction, 0.0);
        assert!(!c.fraction.is_nan());
    }

    #[test]
    fn fraction_of_total() {
        let c = SampleCounts::new(6, 6.0, 10.0);
        assert!((c.fraction - 0.6).abs() < 1e-12);
    }
}
