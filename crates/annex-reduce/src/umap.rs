use std::time::Instant;

use annex_core::{Error, FittedLayout, Hyperparameters, Reducer, ReductionModel, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::curve::fit_ab;
use crate::graph::fuzzy_graph;
use crate::init::pca_layout;
use crate::layout::{optimize_layout, LayoutParams};

/// Native UMAP-style reducer.
///
/// Exact neighbor graph, PCA initialization and negative-sampling SGD.
/// With `seed` set in the hyperparameters a fit is fully reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct UmapReducer;

impl UmapReducer {
    pub fn new() -> Self {
        Self
    }
}

/// Reject samples the fit cannot learn from.
fn check_samples(samples: &[Vec<f32>], params: &Hyperparameters) -> Result<usize> {
    let required = params.min_samples();
    if samples.len() < required {
        return Err(Error::InsufficientTrainingData {
            required,
            found: samples.len(),
        });
    }

    let dim = samples[0].len();
    if dim == 0 {
        return Err(Error::Fit("training vectors are empty".to_string()));
    }
    for (i, s) in samples.iter().enumerate() {
        if s.len() != dim {
            return Err(Error::Fit(format!(
                "training vector {} has length {}, expected {}",
                i,
                s.len(),
                dim
            )));
        }
        if s.iter().any(|v| !v.is_finite()) {
            return Err(Error::Fit(format!(
                "training vector {} has non-finite components",
                i
            )));
        }
    }
    if samples.iter().all(|s| s == &samples[0]) {
        return Err(Error::Fit(
            "all training vectors are identical".to_string(),
        ));
    }
    Ok(dim)
}

impl Reducer for UmapReducer {
    fn fit(&self, samples: &[Vec<f32>], params: &Hyperparameters) -> Result<ReductionModel> {
        params.validate()?;
        let source_dim = check_samples(samples, params)?;
        let start = Instant::now();

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let n_epochs = params.epochs_for(samples.len());
        let mut graph = fuzzy_graph(samples, params.neighbor_count, params.distance_metric);
        graph.prune(n_epochs);
        debug!(
            "neighbor graph: {} vertices, {} edges",
            graph.n_vertices,
            graph.edges.len()
        );

        let (a, b) = fit_ab(params.spread, params.min_distance);
        debug!("curve parameters a={:.4} b={:.4}", a, b);

        let dim = params.target_dimension;
        let mut embedding = pca_layout(samples, dim, &mut rng);
        optimize_layout(
            &mut embedding,
            &graph,
            &LayoutParams {
                dim,
                a,
                b,
                n_epochs,
                negative_sample_rate: params.negative_sample_rate,
                learning_rate: params.learning_rate,
            },
            &mut rng,
        );

        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::Fit("optimization diverged".to_string()));
        }

        let model = ReductionModel::new(
            params.clone(),
            FittedLayout {
                points: samples.to_vec(),
                coordinates: embedding.chunks(dim).map(<[f32]>::to_vec).collect(),
            },
        )?;

        info!(
            "umap fit complete: {} points, {} -> {} dims, {} epochs in {}ms",
            samples.len(),
            source_dim,
            dim,
            n_epochs,
            start.elapsed().as_millis()
        );
        Ok(model)
    }
}
