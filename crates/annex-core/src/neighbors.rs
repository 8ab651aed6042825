//! Exact nearest-neighbor search and smooth-kNN membership strengths.
//!
//! Both fit and transform go through these functions so that a point's
//! neighborhood is weighted the same way at training and at query time.

use std::cmp::Ordering;

use crate::metric::Metric;

/// Binary search iterations for the kernel bandwidth.
const SMOOTH_K_ITERATIONS: usize = 64;
const SMOOTH_K_TOLERANCE: f64 = 1e-5;
/// Lower bound on sigma relative to the mean neighbor distance.
const MIN_K_DIST_SCALE: f64 = 1e-3;

/// A neighbor as `(index into the reference set, distance)`.
pub type Neighbor = (usize, f32);

fn by_distance_then_index(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

/// The `k` reference points nearest to `query`, ascending by distance.
///
/// Equal distances are ordered by reference index, so the result never
/// depends on sort stability. `skip` excludes one index (the query itself
/// when searching within the reference set).
pub fn nearest<P: AsRef<[f32]>>(
    points: &[P],
    query: &[f32],
    k: usize,
    metric: Metric,
    skip: Option<usize>,
) -> Vec<Neighbor> {
    let mut all: Vec<Neighbor> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != skip)
        .map(|(i, p)| (i, metric.distance(p.as_ref(), query)))
        .collect();

    let k = k.min(all.len());
    if k == 0 {
        return Vec::new();
    }
    if k < all.len() {
        all.select_nth_unstable_by(k - 1, by_distance_then_index);
        all.truncate(k);
    }
    all.sort_unstable_by(by_distance_then_index);
    all
}

/// Membership strengths of a point towards its neighbors.
///
/// `distances` must be ascending. The nearest non-zero distance (`rho`) gets
/// full membership and the rest decay with a bandwidth chosen so the strengths
/// sum to `log2(k)`.
pub fn membership_strengths(distances: &[f32]) -> Vec<f32> {
    if distances.is_empty() {
        return Vec::new();
    }

    let d: Vec<f64> = distances.iter().map(|&x| x as f64).collect();
    let rho = d.iter().copied().find(|&x| x > 0.0).unwrap_or(0.0);
    let target = (d.len() as f64).log2();

    let mut lo = 0.0f64;
    let mut hi = f64::INFINITY;
    let mut sigma = 1.0f64;

    for _ in 0..SMOOTH_K_ITERATIONS {
        let psum: f64 = d
            .iter()
            .map(|&x| {
                let gap = x - rho;
                if gap > 0.0 {
                    (-gap / sigma).exp()
                } else {
                    1.0
                }
            })
            .sum();

        if (psum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }
        if psum > target {
            hi = sigma;
            sigma = (lo + hi) / 2.0;
        } else {
            lo = sigma;
            sigma = if hi.is_infinite() {
                sigma * 2.0
            } else {
                (lo + hi) / 2.0
            };
        }
    }

    let mean = d.iter().sum::<f64>() / d.len() as f64;
    sigma = sigma.max(MIN_K_DIST_SCALE * mean);
    if sigma <= 0.0 {
        // every neighbor coincides with the point
        return vec![1.0; d.len()];
    }

    d.iter()
        .map(|&x| {
            let gap = x - rho;
            if gap > 0.0 {
                (-gap / sigma).exp() as f32
            } else {
                1.0
            }
        })
        .collect()
}
