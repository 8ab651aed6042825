//! Query phase: project a raw vector and run a radius-bounded range query.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::ReductionModel;
use crate::storage::VectorStore;
use crate::types::{sort_candidates, Candidate};

/// A similarity query in raw-vector space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub raw_vector: Vec<f32>,
    /// Exclusive bound on embedding-space distance
    pub radius: f32,
    /// Maximum candidates returned
    pub limit: usize,
    /// Attach each candidate's raw vector for reranking
    #[serde(default)]
    pub include_raw: bool,
}

impl QueryRequest {
    pub fn new(raw_vector: Vec<f32>, radius: f32, limit: usize) -> Self {
        Self {
            raw_vector,
            radius,
            limit,
            include_raw: false,
        }
    }

    pub fn with_raw(mut self) -> Self {
        self.include_raw = true;
        self
    }
}

/// Records whose embedding lies within `request.radius` of the projected query.
///
/// Results ascend by distance, equal distances by id. No record in range is
/// an empty result, not an error. The store must hold embeddings from the
/// same generation as `model`.
pub fn find_similar<S: VectorStore + ?Sized>(
    store: &S,
    model: &ReductionModel,
    request: &QueryRequest,
) -> Result<Vec<Candidate>> {
    if request.raw_vector.len() != model.source_dimension() {
        return Err(Error::DimensionMismatch {
            expected: model.source_dimension(),
            found: request.raw_vector.len(),
        });
    }
    if !request.radius.is_finite() || request.radius < 0.0 {
        return Err(Error::InvalidRequest(format!(
            "radius must be a non-negative number, got {}",
            request.radius
        )));
    }
    if request.limit == 0 {
        return Err(Error::InvalidRequest("limit must be positive".to_string()));
    }
    if model.target_dimension() > store.max_dimension() {
        return Err(Error::DimensionTooLarge {
            requested: model.target_dimension(),
            max: store.max_dimension(),
        });
    }

    let store_generation = store.current_generation()?;
    if store_generation.as_deref() != Some(model.generation()) {
        return Err(Error::GenerationMismatch {
            model: model.generation().to_string(),
            store: store_generation,
        });
    }

    let start = Instant::now();
    let probe = model.transform(&request.raw_vector)?;
    let mut candidates = store.within_radius(
        &probe,
        model.metric(),
        request.radius,
        request.limit,
        request.include_raw,
    )?;

    candidates.retain(|c| c.distance < request.radius);
    sort_candidates(&mut candidates);
    candidates.truncate(request.limit);

    debug!(
        "Range query (radius {}, limit {}) returned {} candidates in {}us",
        request.radius,
        request.limit,
        candidates.len(),
        start.elapsed().as_micros()
    );
    Ok(candidates)
}
