//! Bernoulli sampling of training data.

use std::time::Instant;

use tracing::info;

use crate::error::{Error, Result};
use crate::storage::VectorStore;

/// How to draw a training sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    /// Upper bound on rows returned
    pub target_count: usize,
    /// Per-record inclusion probability
    pub probability: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            target_count: 100_000,
            probability: 0.005,
        }
    }
}

/// Draw an approximately `target_count`-sized sample of records with raw vectors.
///
/// The size is never guaranteed; it is capped at `target_count`.
pub fn sample<S: VectorStore + ?Sized>(
    store: &S,
    config: &SampleConfig,
) -> Result<Vec<(String, Vec<f32>)>> {
    if !(config.probability > 0.0 && config.probability <= 1.0) {
        return Err(Error::InvalidRequest(format!(
            "sampling probability must be in (0, 1], got {}",
            config.probability
        )));
    }
    if config.target_count == 0 {
        return Err(Error::InvalidRequest("target_count must be positive".to_string()));
    }

    let start = Instant::now();
    let rows = store.sample(config.probability, config.target_count)?;
    info!(
        "Sampled {} records (p={}, cap {}) in {}ms",
        rows.len(),
        config.probability,
        config.target_count,
        start.elapsed().as_millis()
    );
    Ok(rows)
}
