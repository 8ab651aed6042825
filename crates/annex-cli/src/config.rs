//! Hyperparameters from a JSON file with command-line overrides.

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use annex_core::{Hyperparameters, Metric};
use clap::Args;

#[derive(Args, Debug, Default, Clone)]
pub struct ParamArgs {
    /// JSON file of hyperparameters; absent fields keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Neighbors considered per point
    #[arg(long)]
    pub neighbors: Option<usize>,

    /// Embedding dimension (at most 100)
    #[arg(long)]
    pub dimension: Option<usize>,

    /// Minimum spacing of embedded points
    #[arg(long = "min-dist")]
    pub min_dist: Option<f32>,

    /// Distance metric (euclidean, manhattan, cosine, correlation)
    #[arg(long)]
    pub metric: Option<Metric>,

    /// Seed for a reproducible fit
    #[arg(long)]
    pub seed: Option<u64>,

    /// Optimization epochs
    #[arg(long)]
    pub epochs: Option<usize>,
}

impl ParamArgs {
    /// Defaults, then the config file, then flags.
    pub fn resolve(&self) -> Result<Hyperparameters, Box<dyn Error>> {
        let mut params = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|e| format!("Cannot read config '{}': {}", path.display(), e))?;
                serde_json::from_str(&text)
                    .map_err(|e| format!("Invalid config '{}': {}", path.display(), e))?
            }
            None => Hyperparameters::default(),
        };

        if let Some(n) = self.neighbors {
            params.neighbor_count = n;
        }
        if let Some(d) = self.dimension {
            params.target_dimension = d;
        }
        if let Some(m) = self.min_dist {
            params.min_distance = m;
        }
        if let Some(metric) = self.metric {
            params.distance_metric = metric;
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
        if self.epochs.is_some() {
            params.n_epochs = self.epochs;
        }

        params.validate()?;
        Ok(params)
    }
}
