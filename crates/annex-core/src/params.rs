//! Reduction hyperparameters

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metric::Metric;

/// Largest embedding the backing range index can hold.
pub const MAX_INDEX_DIMENSION: usize = 100;

/// Hyperparameters for fitting a reduction model.
///
/// Every field has a default, so a JSON config file may set any subset:
///
/// ```
/// use annex_core::Hyperparameters;
///
/// let params: Hyperparameters =
///     serde_json::from_str(r#"{"target_dimension": 5, "distance_metric": "cosine"}"#).unwrap();
/// assert_eq!(params.target_dimension, 5);
/// assert_eq!(params.neighbor_count, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Neighbors considered per point; higher favors global over local structure
    pub neighbor_count: usize,
    /// Embedding length, at most [`MAX_INDEX_DIMENSION`]
    pub target_dimension: usize,
    /// Minimum spacing of points in the embedding
    pub min_distance: f32,
    /// Metric for neighbor search, range queries and reranking
    #[serde(alias = "metric")]
    pub distance_metric: Metric,
    /// Fixed seed for reproducible fits
    pub seed: Option<u64>,
    /// Optimization epochs (None = chosen from sample size)
    pub n_epochs: Option<usize>,
    /// Repulsive samples per attractive update
    pub negative_sample_rate: usize,
    /// Initial SGD learning rate
    pub learning_rate: f32,
    /// Scale of the embedded points
    pub spread: f32,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            neighbor_count: 10,
            target_dimension: MAX_INDEX_DIMENSION,
            min_distance: 0.3,
            distance_metric: Metric::Euclidean,
            seed: None,
            n_epochs: None,
            negative_sample_rate: 5,
            learning_rate: 1.0,
            spread: 1.0,
        }
    }
}

impl Hyperparameters {
    /// Check the parameters against each other and the index limit.
    pub fn validate(&self) -> Result<()> {
        if self.target_dimension > MAX_INDEX_DIMENSION {
            return Err(Error::DimensionTooLarge {
                requested: self.target_dimension,
                max: MAX_INDEX_DIMENSION,
            });
        }
        if self.target_dimension == 0 {
            return Err(Error::InvalidRequest(
                "target_dimension must be at least 1".to_string(),
            ));
        }
        if self.neighbor_count < 2 {
            return Err(Error::InvalidRequest(format!(
                "neighbor_count must be at least 2, got {}",
                self.neighbor_count
            )));
        }
        if !self.spread.is_finite() || self.spread <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "spread must be positive, got {}",
                self.spread
            )));
        }
        if !self.min_distance.is_finite()
            || self.min_distance < 0.0
            || self.min_distance > self.spread
        {
            return Err(Error::InvalidRequest(format!(
                "min_distance must be in [0, spread={}], got {}",
                self.spread, self.min_distance
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Epochs to run for a sample of `n_samples` points.
    pub fn epochs_for(&self, n_samples: usize) -> usize {
        self.n_epochs
            .unwrap_or(if n_samples <= 10_000 { 500 } else { 200 })
    }

    /// Smallest sample the fit accepts.
    pub fn min_samples(&self) -> usize {
        self.neighbor_count + 1
    }
}
