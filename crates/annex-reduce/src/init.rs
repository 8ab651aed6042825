//! Initial layout from the leading principal components of the sample.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Power iterations per component.
const POWER_ITERATIONS: usize = 100;
/// Half-width of the box the initial layout is scaled into.
const INIT_EXTENT: f64 = 10.0;
/// Standard deviation of the jitter that separates coincident points.
const JITTER: f64 = 1e-4;

/// Project the centred sample onto its top `dim` principal directions,
/// scaled to `[-10, 10]` and jittered with `rng`.
///
/// Returns a row-major `n * dim` buffer.
pub(crate) fn pca_layout<R: Rng>(samples: &[Vec<f32>], dim: usize, rng: &mut R) -> Vec<f32> {
    let n = samples.len();
    let d = samples.first().map_or(0, |s| s.len());

    let mut x = Array2::<f64>::zeros((n, d));
    for (mut row, sample) in x.axis_iter_mut(Axis(0)).zip(samples) {
        for (cell, &v) in row.iter_mut().zip(sample) {
            *cell = v as f64;
        }
    }
    if let Some(mean) = x.mean_axis(Axis(0)) {
        x -= &mean;
    }

    let mut components: Vec<Array1<f64>> = Vec::with_capacity(dim);
    for _ in 0..dim {
        let mut v: Array1<f64> = (0..d).map(|_| StandardNormal.sample(rng)).collect();
        orthonormalize(&mut v, &components);

        for _ in 0..POWER_ITERATIONS {
            let mut next = x.t().dot(&x.dot(&v));
            orthonormalize(&mut next, &components);
            if next.iter().all(|c| *c == 0.0) {
                // sample rank exhausted; keep the random orthogonal direction
                break;
            }
            v = next;
        }
        components.push(v);
    }

    let mut coords = Array2::<f64>::zeros((n, dim));
    for (c, component) in components.iter().enumerate() {
        coords.column_mut(c).assign(&x.dot(component));
    }

    let max_abs = coords.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if max_abs > 0.0 {
        coords *= INIT_EXTENT / max_abs;
    }

    coords
        .iter()
        .map(|&c| {
            let noise: f64 = StandardNormal.sample(rng);
            (c + JITTER * noise) as f32
        })
        .collect()
}

/// Remove the projections on `basis` and scale to unit length.
///
/// Leaves `v` all zeros when nothing remains.
fn orthonormalize(v: &mut Array1<f64>, basis: &[Array1<f64>]) {
    for b in basis {
        let proj = v.dot(b);
        v.scaled_add(-proj, b);
    }
    let norm = v.dot(v).sqrt();
    if norm > 1e-12 {
        *v /= norm;
    } else {
        v.fill(0.0);
    }
}
