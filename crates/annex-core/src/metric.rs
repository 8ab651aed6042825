//! Distance metrics shared by neighbor search, range queries and reranking.
//!
//! All metrics return a distance where lower means more similar.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Distance metric used in raw space and embedding space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// L2 distance. Range: \[0, ∞).
    #[default]
    Euclidean,
    /// L1 distance. Range: \[0, ∞).
    Manhattan,
    /// `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
    /// `1 - pearson_correlation`. Range: \[0, 2\].
    Correlation,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Euclidean,
        Metric::Manhattan,
        Metric::Cosine,
        Metric::Correlation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::Cosine => "cosine",
            Metric::Correlation => "correlation",
        }
    }

    /// Distance between two equal-length vectors.
    ///
    /// Accumulates in f64 so the result does not depend on vector length
    /// rounding. Zero-norm inputs to cosine/correlation yield 1.0.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "vector dimension mismatch");
        match self {
            Metric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(&x, &y)| {
                    let d = x as f64 - y as f64;
                    d * d
                })
                .sum::<f64>()
                .sqrt() as f32,
            Metric::Manhattan => a
                .iter()
                .zip(b)
                .map(|(&x, &y)| (x as f64 - y as f64).abs())
                .sum::<f64>() as f32,
            Metric::Cosine => cosine_distance(a, b, 0.0, 0.0),
            Metric::Correlation => {
                let n = a.len().max(1) as f64;
                let mean_a = a.iter().map(|&x| x as f64).sum::<f64>() / n;
                let mean_b = b.iter().map(|&x| x as f64).sum::<f64>() / n;
                cosine_distance(a, b, mean_a, mean_b)
            }
        }
    }
}

fn cosine_distance(a: &[f32], b: &[f32], shift_a: f64, shift_b: f64) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let x = x as f64 - shift_a;
        let y = y as f64 - shift_b;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 1.0;
    }
    (1.0 - dot / denom).max(0.0) as f32
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "manhattan" | "l1" => Ok(Metric::Manhattan),
            "cosine" => Ok(Metric::Cosine),
            "correlation" => Ok(Metric::Correlation),
            other => Err(format!(
                "unknown metric '{}', expected one of: euclidean, manhattan, cosine, correlation",
                other
            )),
        }
    }
}
