//! Stochastic gradient descent on the low-dimensional layout.

use rand::Rng;

use crate::graph::FuzzyGraph;

/// Gradient components are clipped to `[-CLIP, CLIP]`.
const CLIP: f32 = 4.0;
/// Keeps the repulsive force finite for near-coincident points.
const REPULSION_EPS: f32 = 1e-3;

/// Schedule and curve shared by every epoch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LayoutParams {
    pub dim: usize,
    pub a: f32,
    pub b: f32,
    pub n_epochs: usize,
    pub negative_sample_rate: usize,
    pub learning_rate: f32,
}

fn clip(v: f32) -> f32 {
    v.clamp(-CLIP, CLIP)
}

fn squared_distance(embedding: &[f32], dim: usize, i: usize, j: usize) -> f32 {
    let (x, y) = (&embedding[i * dim..(i + 1) * dim], &embedding[j * dim..(j + 1) * dim]);
    x.iter().zip(y).map(|(p, q)| (p - q) * (p - q)).sum()
}

/// Optimize `embedding` (row-major, `n_vertices * dim`) in place.
///
/// Each edge is visited in both directions; an edge of weight `w` is
/// sampled once every `max_weight / w` epochs and brings
/// `negative_sample_rate` random repulsions with it. The learning rate
/// decays linearly to zero over `n_epochs`.
pub(crate) fn optimize_layout<R: Rng>(
    embedding: &mut [f32],
    graph: &FuzzyGraph,
    params: &LayoutParams,
    rng: &mut R,
) {
    let LayoutParams { dim, a, b, n_epochs, negative_sample_rate, learning_rate } = *params;
    let n = graph.n_vertices;
    if graph.edges.is_empty() || n < 2 || dim == 0 {
        return;
    }

    let mut heads = Vec::with_capacity(graph.edges.len() * 2);
    let mut tails = Vec::with_capacity(graph.edges.len() * 2);
    let mut weights = Vec::with_capacity(graph.edges.len() * 2);
    for &(i, j, w) in &graph.edges {
        heads.extend([i, j]);
        tails.extend([j, i]);
        weights.extend([w, w]);
    }

    let max_weight = graph.max_weight();
    let epochs_per_sample: Vec<f32> = weights.iter().map(|w| max_weight / w).collect();
    let negative_rate = negative_sample_rate.max(1) as f32;
    let epochs_per_negative: Vec<f32> =
        epochs_per_sample.iter().map(|e| e / negative_rate).collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    let mut grad = vec![0.0f32; dim];
    for epoch in 0..n_epochs {
        let alpha = learning_rate * (1.0 - epoch as f32 / n_epochs as f32);
        let now = epoch as f32;

        for e in 0..heads.len() {
            if next_sample[e] > now {
                continue;
            }
            let (j, k) = (heads[e], tails[e]);

            let d2 = squared_distance(embedding, dim, j, k);
            let coeff = if d2 > 0.0 {
                -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..dim {
                grad[d] = clip(coeff * (embedding[j * dim + d] - embedding[k * dim + d]));
            }
            for d in 0..dim {
                embedding[j * dim + d] += grad[d] * alpha;
                embedding[k * dim + d] -= grad[d] * alpha;
            }
            next_sample[e] += epochs_per_sample[e];

            let n_negative = ((now - next_negative[e]) / epochs_per_negative[e]).floor().max(0.0) as usize;
            for _ in 0..n_negative {
                let k = rng.gen_range(0..n);
                if k == j {
                    continue;
                }
                let d2 = squared_distance(embedding, dim, j, k);
                let coeff = if d2 > 0.0 {
                    2.0 * b / ((REPULSION_EPS + d2) * (a * d2.powf(b) + 1.0))
                } else {
                    0.0
                };
                for d in 0..dim {
                    let g = if coeff > 0.0 {
                        clip(coeff * (embedding[j * dim + d] - embedding[k * dim + d]))
                    } else {
                        CLIP
                    };
                    embedding[j * dim + d] += g * alpha;
                }
            }
            next_negative[e] += n_negative as f32 * epochs_per_negative[e];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(n_epochs: usize) -> LayoutParams {
        LayoutParams {
            dim: 1,
            a: 1.577,
            b: 0.895,
            n_epochs,
            negative_sample_rate: 5,
            learning_rate: 1.0,
        }
    }

    #[test]
    fn connected_points_move_closer_than_strangers() {
        // 0-1 and 2-3 are linked, the pairs are not
        let graph = FuzzyGraph {
            n_vertices: 4,
            edges: vec![(0, 1, 1.0), (2, 3, 1.0)],
        };
        let mut embedding = vec![-5.0, 5.0, -4.0, 6.0];
        optimize_layout(&mut embedding, &graph, &params(200), &mut StdRng::seed_from_u64(3));

        let within = (embedding[0] - embedding[1]).abs() + (embedding[2] - embedding[3]).abs();
        assert!(within < 10.0, "linked points stayed apart: {:?}", embedding);
        assert!(embedding.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_epochs_leaves_layout_alone() {
        let graph = FuzzyGraph {
            n_vertices: 2,
            edges: vec![(0, 1, 1.0)],
        };
        let mut embedding = vec![0.0, 3.0];
        optimize_layout(&mut embedding, &graph, &params(0), &mut StdRng::seed_from_u64(1));
        assert_eq!(embedding, vec![0.0, 3.0]);
    }

    #[test]
    fn seeded_runs_match() {
        let graph = FuzzyGraph {
            n_vertices: 5,
            edges: vec![(0, 1, 1.0), (1, 2, 0.6), (2, 3, 0.9), (3, 4, 0.3)],
        };
        let start = vec![0.0, 1.0, 2.5, 3.0, 7.0];
        let mut x = start.clone();
        let mut y = start.clone();
        optimize_layout(&mut x, &graph, &params(50), &mut StdRng::seed_from_u64(11));
        optimize_layout(&mut y, &graph, &params(50), &mut StdRng::seed_from_u64(11));
        assert_eq!(x, y);
    }
}
