//! Storage abstraction for records and their embeddings
//!
//! This module defines the `VectorStore` trait that abstracts over different
//! storage backends. Implementations exist for:
//!
//! - **Memory**: In-memory storage for testing (`MemoryStore`)
//! - **SQLite**: rusqlite + sqlite-vec (separate crate, `annex-sqlite`)
//!
//! # Example
//!
//! ```rust
//! use annex_core::storage::{MemoryStore, VectorStore};
//! use annex_core::{IdRange, Record};
//!
//! let mut store = MemoryStore::new();
//! store.put_records(&[Record::new("img-1", vec![0.1, 0.2, 0.3])]).unwrap();
//!
//! let pending = store.pending(&IdRange::all(), 100).unwrap();
//! assert_eq!(pending.len(), 1);
//! ```

mod error;
pub(crate) mod memory;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::VectorStore;
