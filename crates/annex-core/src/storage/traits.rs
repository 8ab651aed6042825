//! Storage trait definitions

use crate::metric::Metric;
use crate::params::MAX_INDEX_DIMENSION;
use crate::storage::error::StoreResult;
use crate::types::{Candidate, IdRange, Record, StoreStats};

/// Record storage with an embedding column indexed for range queries.
///
/// Reads take `&self` so a store can serve concurrent queries; writes take
/// `&mut self`. Implementations exist for:
/// - Memory: [`crate::storage::MemoryStore`]
/// - SQLite: `annex-sqlite`
pub trait VectorStore {
    /// Insert records, replacing any with the same id.
    ///
    /// A replaced record loses its embedding.
    fn put_records(&mut self, records: &[Record]) -> StoreResult<usize>;

    /// Bernoulli sample: each record with a raw vector is kept independently
    /// with `probability`, and at most `limit` rows are returned.
    fn sample(&self, probability: f64, limit: usize) -> StoreResult<Vec<(String, Vec<f32>)>>;

    /// Up to `limit` records with a raw vector and no embedding inside `range`,
    /// ordered by id ascending.
    fn pending(&self, range: &IdRange, limit: usize) -> StoreResult<Vec<(String, Vec<f32>)>>;

    /// Write a batch of embeddings stamped with `generation` in one atomic call.
    ///
    /// Rows that already carry an embedding are left untouched. Returns the
    /// number of rows written.
    fn write_embeddings(&mut self, generation: &str, batch: &[(String, Vec<f32>)])
        -> StoreResult<usize>;

    /// Records whose embedding is strictly within `radius` of `probe`,
    /// ascending by distance then id, at most `limit`.
    fn within_radius(
        &self,
        probe: &[f32],
        metric: Metric,
        radius: f32,
        limit: usize,
        include_raw: bool,
    ) -> StoreResult<Vec<Candidate>>;

    /// Generation stamp of the embeddings currently in the store.
    fn current_generation(&self) -> StoreResult<Option<String>>;

    /// Atomically drop every embedding and stamp the store with `generation`.
    fn begin_generation(&mut self, generation: &str) -> StoreResult<()>;

    /// Record counts.
    fn stats(&self) -> StoreResult<StoreStats>;

    /// Longest embedding the range index accepts.
    fn max_dimension(&self) -> usize {
        MAX_INDEX_DIMENSION
    }
}
