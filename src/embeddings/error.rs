//! Error taxonomy for word embedding lookups

use thiserror::Error;

/// Errors surfaced by [`EmbeddingTable`](super::EmbeddingTable) and
/// [`EmbeddingService`](super::EmbeddingService).
///
/// Nothing here is recovered locally: every failure reaches the caller with
/// its original cause attached.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The model's block is something other than a vocabulary → vector table.
    #[error("the model was not an embedding (found {kind})")]
    InvalidModelShape { kind: String },

    /// A model property required at construction time is not set.
    #[error("model property `{0}` is not set")]
    MissingProperty(String),

    /// The configured unknown token is absent from the vocabulary.
    ///
    /// This is a defect of the model artifact, not of the caller's input.
    #[error("unknown token `{0}` is not part of the model vocabulary")]
    UnknownTokenNotInVocabulary(String),

    /// The inference runner failed while computing an embedding.
    #[error("could not embed word")]
    EmbeddingComputation(#[source] anyhow::Error),

    /// The operation is intentionally not implemented.
    #[error("{0} is not supported")]
    UnsupportedOperation(&'static str),

    /// The service has already released its resources.
    #[error("the embedding service is closed")]
    Closed,

    /// The model or its inference session could not be loaded.
    #[error("failed to load embedding model")]
    ModelLoad(#[source] anyhow::Error),
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_computation_error_keeps_cause() {
        let err = EmbeddingError::EmbeddingComputation(anyhow::anyhow!("device lost"));
        assert_eq!(err.to_string(), "could not embed word");
        let cause = err.source().expect("cause must be attached");
        assert_eq!(cause.to_string(), "device lost");
    }

    #[test]
    fn test_invalid_shape_message_names_kind() {
        let err = EmbeddingError::InvalidModelShape {
            kind: "linear".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "the model was not an embedding (found linear)"
        );
    }
}
