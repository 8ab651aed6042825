//! Fit of the embedding-space similarity curve `1 / (1 + a * d^(2b))`.
//!
//! The target is 1 below `min_dist` and decays as `exp(-(d - min_dist) / spread)`
//! beyond it. Solved with Levenberg-Marquardt on a fixed grid, so the same
//! inputs always give the same `(a, b)`.

const GRID_POINTS: usize = 300;
const MAX_ITERATIONS: usize = 200;

fn residuals(xs: &[f64], ys: &[f64], a: f64, b: f64) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = model(x, a, b) - y;
            r * r
        })
        .sum()
}

fn model(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    1.0 / (1.0 + a * x.powf(2.0 * b))
}

/// Curve parameters `(a, b)` for the given `spread` and `min_dist`.
pub(crate) fn fit_ab(spread: f32, min_dist: f32) -> (f32, f32) {
    let spread = spread as f64;
    let min_dist = min_dist as f64;

    let xs: Vec<f64> = (0..GRID_POINTS)
        .map(|i| 3.0 * spread * i as f64 / (GRID_POINTS - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let (mut a, mut b) = (1.0f64, 1.0f64);
    let mut lambda = 1e-3;
    let mut cost = residuals(&xs, &ys, a, b);

    for _ in 0..MAX_ITERATIONS {
        // normal equations J^T J and J^T r
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            if x <= 0.0 {
                continue;
            }
            let u = x.powf(2.0 * b);
            let denom = (1.0 + a * u) * (1.0 + a * u);
            let da = -u / denom;
            let db = -a * u * 2.0 * x.ln() / denom;
            let r = model(x, a, b) - y;
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * r;
            gb += db * r;
        }

        let (maa, mbb) = (jaa * (1.0 + lambda), jbb * (1.0 + lambda));
        let det = maa * mbb - jab * jab;
        if det.abs() < 1e-300 {
            break;
        }
        let step_a = -(mbb * ga - jab * gb) / det;
        let step_b = -(maa * gb - jab * ga) / det;

        let (na, nb) = (a + step_a, b + step_b);
        if na > 0.0 && nb > 0.0 {
            let new_cost = residuals(&xs, &ys, na, nb);
            if new_cost < cost {
                let improvement = cost - new_cost;
                a = na;
                b = nb;
                cost = new_cost;
                lambda = (lambda / 10.0).max(1e-12);
                if improvement < 1e-14 {
                    break;
                }
                continue;
            }
        }
        lambda *= 10.0;
        if lambda > 1e12 {
            break;
        }
    }

    (a as f32, b as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_values() {
        // umap-learn reports a≈1.577, b≈0.895 for the default min_dist=0.1
        let (a, b) = fit_ab(1.0, 0.1);
        assert!((a - 1.577).abs() < 0.05, "a = {}", a);
        assert!((b - 0.895).abs() < 0.02, "b = {}", b);
    }

    #[test]
    fn larger_min_dist_flattens_curve() {
        let (a_small, _) = fit_ab(1.0, 0.1);
        let (a_large, _) = fit_ab(1.0, 0.5);
        assert!(a_large < a_small, "{} vs {}", a_large, a_small);
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(fit_ab(1.0, 0.3), fit_ab(1.0, 0.3));
    }
}
