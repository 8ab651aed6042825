//! SQLite storage backend for annex
//!
//! A persistent implementation of the annex-core [`VectorStore`] and
//! [`ModelStore`] traits. Records, embeddings, the generation stamp and saved
//! models live in one database file.
//!
//! # Features
//!
//! - sqlite-vec distance functions for the embedding range query
//! - Correlation distance registered as a scalar function
//! - Embedded schema migrations
//! - In-memory databases for testing
//! - One store serves concurrent readers
//!
//! # Example
//!
//! ```rust,no_run
//! use annex_core::{find_similar, load_model, populate, PopulateConfig, QueryRequest};
//! use annex_sqlite::SqliteStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = SqliteStore::open("annex.db")?;
//!
//! // A model trained earlier with `annex_core::train_and_save`
//! let model = load_model(&store)?;
//! populate(&mut store, &model, &PopulateConfig::default())?;
//!
//! let request = QueryRequest::new(vec![0.0; model.source_dimension()], 0.25, 25);
//! for hit in find_similar(&store, &model, &request)? {
//!     println!("{}\t{}", hit.id, hit.distance);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`VectorStore`]: annex_core::VectorStore
//! [`ModelStore`]: annex_core::ModelStore

pub mod error;
pub mod migrate;
pub mod store;
pub mod vec;

// Re-export main types
pub use error::{Result, SqliteError};
pub use store::SqliteStore;
