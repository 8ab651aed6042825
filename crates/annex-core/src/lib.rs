//! annex core
//!
//! Approximate nearest-neighbor search over high-dimensional vectors through a
//! trained dimensionality reduction:
//!
//! 1. **Train**: Bernoulli-sample the store and fit a [`ReductionModel`]
//!    ([`trainer::train`]).
//! 2. **Populate**: project every record lacking an embedding and write the
//!    embeddings back in batches ([`populate::populate`]).
//! 3. **Query**: project a query vector with the same model and run a
//!    radius-bounded range query ([`query::find_similar`]), optionally
//!    reranking in raw space ([`rerank::rerank`]).
//!
//! Storage and model persistence sit behind the [`VectorStore`] and
//! [`ModelStore`] traits. The pipeline never performs I/O of its own; the
//! model is passed by reference into population and query.
//!
//! # Example
//!
//! ```rust
//! use annex_core::model::FittedLayout;
//! use annex_core::storage::{MemoryStore, VectorStore};
//! use annex_core::{find_similar, populate, Hyperparameters, PopulateConfig, QueryRequest, Record, ReductionModel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // A hand-built model: three training points embedded on a line
//! let params = Hyperparameters { neighbor_count: 2, target_dimension: 1, ..Default::default() };
//! let model = ReductionModel::new(params, FittedLayout {
//!     points: vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![2.0, 0.0]],
//!     coordinates: vec![vec![0.0], vec![1.0], vec![2.0]],
//! })?;
//!
//! let mut store = MemoryStore::new();
//! store.put_records(&[Record::new("a", vec![0.1, 0.0]), Record::new("b", vec![1.9, 0.0])])?;
//! populate(&mut store, &model, &PopulateConfig::default())?;
//!
//! let hits = find_similar(&store, &model, &QueryRequest::new(vec![0.0, 0.0], 0.8, 10))?;
//! assert_eq!(hits[0].id, "a");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod format;
pub mod metric;
pub mod model;
pub mod model_store;
pub mod neighbors;
pub mod params;
pub mod populate;
pub mod query;
pub mod reducer;
pub mod rerank;
pub mod sampler;
pub mod storage;
pub mod trainer;
pub mod types;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use metric::Metric;
pub use model::{FittedLayout, ReductionModel};
pub use model_store::{
    load_model, save_model, FileModelStore, MemoryModelStore, ModelStore, CURRENT_MODEL_KEY,
};
pub use params::{Hyperparameters, MAX_INDEX_DIMENSION};
pub use populate::{populate, PopulateConfig, PopulateReport, RetryPolicy};
pub use query::{find_similar, QueryRequest};
pub use reducer::Reducer;
pub use rerank::rerank;
pub use sampler::{sample, SampleConfig};
pub use storage::{MemoryStore, StoreError, StoreResult, VectorStore};
pub use trainer::{train, train_and_save, TrainConfig};
pub use types::{sort_candidates, Candidate, IdRange, Record, StoreStats};
