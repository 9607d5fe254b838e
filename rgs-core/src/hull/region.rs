//! Geometry of a cut-point in the two-variable cut plane.

use serde::{Deserialize, Serialize};

use crate::cuts::CutDirection;

/// Drawing box of the cut plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.xmin, self.xmax, self.ymin, self.ymax]
            .iter()
            .all(|v| v.is_finite())
            && self.xmin < self.xmax
            && self.ymin < self.ymax
    }
}

/// Axis-aligned rectangle `[x0, x1] × [y0, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

/// One variable's cut, seen as a constraint along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCut {
    pub direction: CutDirection,
    pub threshold: f64,
}

impl AxisCut {
    pub fn passes(&self, value: f64) -> bool {
        self.direction.passes(value, self.threshold)
    }

    /// Accepted intervals inside `[lo, hi]`, empty ones dropped.
    fn intervals(&self, lo: f64, hi: f64) -> Vec<(f64, f64)> {
        let t = self.threshold;
        let raw = match self.direction {
            CutDirection::Gt => vec![(t, hi)],
            CutDirection::Lt => vec![(lo, t)],
            CutDirection::AbsGt if t < 0.0 => vec![(lo, hi)],
            CutDirection::AbsGt => vec![(lo, -t), (t, hi)],
            CutDirection::AbsLt => vec![(-t, t)],
            CutDirection::Eq => vec![(t, t)],
        };
        raw.into_iter()
            .map(|(a, b)| (a.max(lo), b.min(hi)))
            .filter(|(a, b)| a <= b)
            .collect()
    }
}

/// The region a cut-point accepts in the (x, y) plane.
///
/// Unbounded sides are closed off by the plane's bounds. `|>` cuts split into
/// two bands per axis, so a region is a union of up to four rectangles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutRegion {
    pub x: AxisCut,
    pub y: AxisCut,
    rects: Vec<Rect>,
}

impl CutRegion {
    pub fn new(x: AxisCut, y: AxisCut, bounds: &Bounds) -> Self {
        let xs = x.intervals(bounds.xmin, bounds.xmax);
        let ys = y.intervals(bounds.ymin, bounds.ymax);
        let rects = xs
            .iter()
            .flat_map(|&(x0, x1)| ys.iter().map(move |&(y0, y1)| Rect { x0, x1, y0, y1 }))
            .collect();
        Self { x, y, rects }
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Exact membership, independent of the drawing bounds.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x.passes(x) && self.y.passes(y)
    }
}
