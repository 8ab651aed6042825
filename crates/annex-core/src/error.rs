//! Error taxonomy for training, population and query

use thiserror::Error;

use crate::storage::StoreError;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the training, population and query phases.
#[derive(Debug, Error)]
pub enum Error {
    /// Sample too small to fit a model
    #[error("insufficient training data: need at least {required} samples, got {found}")]
    InsufficientTrainingData { required: usize, found: usize },

    /// Numeric failure inside the reduction algorithm, or a degenerate sample
    #[error("fit failed: {0}")]
    Fit(String),

    /// A raw vector does not have the model's source dimension
    #[error("dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Target dimension exceeds what the backing index can hold
    #[error("target dimension {requested} exceeds index limit of {max}")]
    DimensionTooLarge { requested: usize, max: usize },

    /// Transient storage failure
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store holds embeddings from a different model generation
    #[error("model generation {model} does not match store generation {}", store.as_deref().unwrap_or("<none>"))]
    GenerationMismatch {
        model: String,
        store: Option<String>,
    },

    /// No model saved under the given key
    #[error("no model saved under '{0}'")]
    ModelNotFound(String),

    /// Malformed request or configuration
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Non-transient storage failure
    #[error(transparent)]
    Store(StoreError),
}

impl Error {
    /// Whether the failed operation may be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Error::StoreUnavailable(msg),
            other => Error::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_maps_to_retryable() {
        let err: Error = StoreError::Unavailable("database is locked".into()).into();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn backend_is_not_retryable() {
        let err: Error = StoreError::Backend("disk I/O error".into()).into();
        assert!(matches!(err, Error::Store(StoreError::Backend(_))));
        assert!(!err.is_retryable());
    }

    #[test]
    fn generation_mismatch_message() {
        let err = Error::GenerationMismatch {
            model: "abc".into(),
            store: None,
        };
        assert_eq!(
            err.to_string(),
            "model generation abc does not match store generation <none>"
        );
    }
}
