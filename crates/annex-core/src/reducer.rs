/// Contract for dimensionality reduction backends.
///
/// Current implementation: the native UMAP-style fit in `annex-reduce`.
/// Fitting is one blocking call with no cancellation point; a failed fit
/// returns an error and never a partial model.
pub trait Reducer {
    /// Fit a model on `samples`, all of one length.
    fn fit(
        &self,
        samples: &[Vec<f32>],
        params: &crate::params::Hyperparameters,
    ) -> crate::error::Result<crate::model::ReductionModel>;
}
