//! Training phase: sample the store, fit a model, optionally persist it.

use std::time::Instant;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::model::ReductionModel;
use crate::model_store::{save_model, ModelStore};
use crate::params::Hyperparameters;
use crate::reducer::Reducer;
use crate::sampler::{sample, SampleConfig};
use crate::storage::VectorStore;

/// Configuration for one training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainConfig {
    pub sample: SampleConfig,
    pub params: Hyperparameters,
}

/// Sample `store` and fit a new model generation.
///
/// Configuration errors (including a target dimension the store's index
/// cannot hold) are reported before the store is read.
pub fn train<S, R>(store: &S, reducer: &R, config: &TrainConfig) -> Result<ReductionModel>
where
    S: VectorStore + ?Sized,
    R: Reducer + ?Sized,
{
    config.params.validate()?;
    if config.params.target_dimension > store.max_dimension() {
        return Err(Error::DimensionTooLarge {
            requested: config.params.target_dimension,
            max: store.max_dimension(),
        });
    }

    info!("Fetching training data");
    let rows = sample(store, &config.sample)?;
    let required = config.params.min_samples();
    if rows.len() < required {
        error!(
            "Sample of {} records is below the {} needed to fit",
            rows.len(),
            required
        );
        return Err(Error::InsufficientTrainingData {
            required,
            found: rows.len(),
        });
    }

    let samples: Vec<Vec<f32>> = rows.into_iter().map(|(_, v)| v).collect();
    info!(
        "Fitting {}-d model on {} samples ({} neighbors, min_dist {}, {})",
        config.params.target_dimension,
        samples.len(),
        config.params.neighbor_count,
        config.params.min_distance,
        config.params.distance_metric
    );

    let start = Instant::now();
    let model = reducer.fit(&samples, &config.params).map_err(|e| {
        error!("Fit failed: {}", e);
        e
    })?;

    if model.target_dimension() != config.params.target_dimension {
        return Err(Error::Fit(format!(
            "reducer produced {}-d model, requested {}",
            model.target_dimension(),
            config.params.target_dimension
        )));
    }

    info!(
        "Fit complete: generation {} in {}ms",
        model.generation(),
        start.elapsed().as_millis()
    );
    Ok(model)
}

/// Train and persist as the current model. Nothing is saved unless the fit succeeds.
pub fn train_and_save<S, R, M>(
    store: &S,
    reducer: &R,
    models: &mut M,
    config: &TrainConfig,
) -> Result<ReductionModel>
where
    S: VectorStore + ?Sized,
    R: Reducer + ?Sized,
    M: ModelStore + ?Sized,
{
    let model = train(store, reducer, config)?;
    save_model(models, &model)?;
    Ok(model)
}
