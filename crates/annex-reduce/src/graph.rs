//! Fuzzy neighbor graph over the training sample.

use std::collections::BTreeMap;

use annex_core::neighbors::{membership_strengths, nearest};
use annex_core::Metric;
use rayon::prelude::*;

/// Undirected weighted edge `(i, j, weight)` with `i < j`.
pub(crate) type Edge = (usize, usize, f32);

/// Symmetric fuzzy membership graph, edges sorted by `(i, j)`.
#[derive(Debug, Clone)]
pub(crate) struct FuzzyGraph {
    pub n_vertices: usize,
    pub edges: Vec<Edge>,
}

impl FuzzyGraph {
    pub fn max_weight(&self) -> f32 {
        self.edges.iter().map(|e| e.2).fold(0.0, f32::max)
    }

    /// Drop edges too weak to be sampled within `n_epochs`.
    pub fn prune(&mut self, n_epochs: usize) {
        let floor = self.max_weight() / n_epochs.max(1) as f32;
        self.edges.retain(|e| e.2 >= floor);
    }
}

/// Build the graph from exact `k`-nearest neighbors under `metric`.
///
/// Rows are computed in parallel but each row only depends on the sample,
/// so the graph is the same on every run.
pub(crate) fn fuzzy_graph(samples: &[Vec<f32>], k: usize, metric: Metric) -> FuzzyGraph {
    let rows: Vec<Vec<(usize, f32)>> = (0..samples.len())
        .into_par_iter()
        .map(|i| {
            let neighbors = nearest(samples, &samples[i], k, metric, Some(i));
            let distances: Vec<f32> = neighbors.iter().map(|n| n.1).collect();
            let strengths = membership_strengths(&distances);
            neighbors
                .iter()
                .zip(strengths)
                .map(|(&(j, _), w)| (j, w))
                .collect()
        })
        .collect();

    // (low, high) -> (weight low->high, weight high->low)
    let mut directed: BTreeMap<(usize, usize), (f32, f32)> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        for &(j, w) in row {
            if i < j {
                directed.entry((i, j)).or_default().0 = w;
            } else {
                directed.entry((j, i)).or_default().1 = w;
            }
        }
    }

    let edges = directed
        .into_iter()
        .map(|((i, j), (a, b))| (i, j, a + b - a * b))
        .filter(|e| e.2 > 0.0)
        .collect();

    FuzzyGraph {
        n_vertices: samples.len(),
        edges,
    }
}
