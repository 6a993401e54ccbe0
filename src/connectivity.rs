//! Proximity graph over a point field, emitted as line-segment buffers.
//!
//! Candidate pairs are those closer than the distance threshold; each candidate
//! is then kept with an independent Bernoulli draw. The pair scan is O(N²),
//! which is why point counts on this path are kept to a few hundred in
//! reduced quality.

use rand::Rng;

use crate::point_field::PointField;

/// Synapse line color for an averaged activity level.
pub fn synapse_color(activity: f32) -> [f32; 3] {
    [0.2 + activity * 0.3, 0.3 + activity * 0.5, 0.8 + activity * 0.2]
}

/// Undirected edge between two point indices, `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub a: u32,
    pub b: u32,
}

/// Line-segment buffers derived from a point field.
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    /// Kept edges in scan order.
    pub edges: Vec<Edge>,
    /// Two xyz endpoints per edge, length `6 * edges.len()`.
    pub line_positions: Vec<f32>,
    /// Two RGB entries per edge, length `6 * edges.len()`.
    pub line_colors: Vec<f32>,
}

impl Connectivity {
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Build the proximity graph for `field`.
///
/// `threshold` is a strict upper bound on endpoint distance and
/// `retention` the probability of keeping each candidate pair.
///
/// # Panics
///
/// Panics if `threshold` is not positive or `retention` lies outside [0, 1].
pub fn build_connectivity<R: Rng + ?Sized>(
    field: &PointField,
    threshold: f32,
    retention: f64,
    rng: &mut R,
) -> Connectivity {
    assert!(threshold > 0.0, "connection threshold must be positive");
    assert!((0.0..=1.0).contains(&retention), "retention must be a probability");

    let n = field.len();
    let threshold_sq = threshold * threshold;
    let mut out = Connectivity::default();

    for i in 0..n {
        let pi = field.position(i);
        for j in (i + 1)..n {
            let pj = field.position(j);
            if pi.distance_squared(pj) >= threshold_sq {
                continue;
            }
            if !rng.gen_bool(retention) {
                continue;
            }

            out.edges.push(Edge { a: i as u32, b: j as u32 });
            out.line_positions.extend_from_slice(&pi.to_array());
            out.line_positions.extend_from_slice(&pj.to_array());

            let color = synapse_color((field.activity(i) + field.activity(j)) / 2.0);
            out.line_colors.extend_from_slice(&color);
            out.line_colors.extend_from_slice(&color);
        }
    }

    log::debug!(
        "connectivity: {} edges over {} points (threshold {}, retention {})",
        out.edges.len(),
        n,
        threshold,
        retention
    );
    out
}
