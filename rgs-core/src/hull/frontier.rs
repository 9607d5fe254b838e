//! Pareto frontier in the (background fraction, signal fraction) plane.

use serde::{Deserialize, Serialize};

use crate::significance::Scored;

/// A result row projected for the hull, with its dominance flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HullPoint {
    pub row: usize,
    pub fb: f64,
    pub fs: f64,
    pub z: f64,
    pub dominated: bool,
}

impl From<Scored> for HullPoint {
    fn from(sc: Scored) -> Self {
        Self {
            row: sc.row,
            fb: sc.fb,
            fs: sc.fs,
            z: sc.z,
            dominated: false,
        }
    }
}

/// `a` dominates `b`: at least as much signal for no more background, and
/// strictly better on one of the two.
pub fn dominates(a: &HullPoint, b: &HullPoint) -> bool {
    a.fs >= b.fs && a.fb <= b.fb && (a.fs > b.fs || a.fb < b.fb)
}

/// Flag dominated points and return the frontier as indexes into `points`,
/// ordered by increasing `fb`, then decreasing `fs`, then row.
///
/// Points with identical `(fb, fs)` do not dominate each other and are all
/// kept.
pub fn mark_frontier(points: &mut [HullPoint]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| {
        let (a, b) = (&points[i], &points[j]);
        a.fb.total_cmp(&b.fb)
            .then(b.fs.total_cmp(&a.fs))
            .then(a.row.cmp(&b.row))
    });

    let mut frontier = Vec::new();
    // (fb, fs) of the first point that reached the current best fs.
    let mut best: Option<(f64, f64)> = None;
    for i in order {
        let p = &mut points[i];
        let keep = match best {
            None => true,
            Some((bfb, bfs)) => p.fs > bfs || (p.fs == bfs && p.fb == bfb),
        };
        if keep {
            if best.map_or(true, |(_, bfs)| p.fs > bfs) {
                best = Some((p.fb, p.fs));
            }
            p.dominated = false;
            frontier.push(i);
        } else {
            p.dominated = true;
        }
    }
    frontier
}
