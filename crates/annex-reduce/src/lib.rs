//! annex reduce
//!
//! Native dimensionality reduction behind [`annex_core::Reducer`]. The fit
//! follows UMAP:
//!
//! 1. exact k-nearest-neighbor graph with smooth-kNN membership strengths,
//!    symmetrized by fuzzy union
//! 2. curve parameters `(a, b)` fitted to `spread` and `min_distance`
//! 3. initial layout from the top principal components
//! 4. SGD with attractive edge updates and negative-sample repulsion
//!
//! New points are projected by [`annex_core::ReductionModel::transform`],
//! which weighs the same neighbor strengths used here.
//!
//! ```rust,no_run
//! use annex_core::{Hyperparameters, Reducer};
//! use annex_reduce::UmapReducer;
//!
//! # fn main() -> annex_core::Result<()> {
//! let samples: Vec<Vec<f32>> = (0..200).map(|i| vec![i as f32; 64]).collect();
//! let params = Hyperparameters { target_dimension: 8, seed: Some(1), ..Default::default() };
//! let model = UmapReducer.fit(&samples, &params)?;
//! assert_eq!(model.target_dimension(), 8);
//! # Ok(())
//! # }
//! ```

mod curve;
mod graph;
mod init;
mod layout;
mod umap;

pub use umap::UmapReducer;
