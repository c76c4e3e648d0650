//! Collaborator traits for the embedding service
//!
//! The service never loads weights or runs tensors itself. It talks to two
//! external capabilities:
//! - `WordModel`: an opened model handle (properties, block structure, sessions)
//! - `InferenceRunner`: a session able to run the model forward on a batch
//!
//! Both are `Send + Sync` so a service can live behind an `Arc` and serve
//! concurrent callers when the runner allows it.

use anyhow::Result;
use async_trait::async_trait;

use super::table::{LookupKey, ModelBlock};

/// Embedding vector produced by a runner.
pub type EmbeddingVector = Vec<f32>;

/// Prepared model input for a single word.
///
/// Produced by [`EmbeddingService::prepare_input`](super::EmbeddingService::prepare_input)
/// without touching the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInput {
    key: LookupKey,
}

impl RawInput {
    pub(crate) fn new(key: LookupKey) -> Self {
        Self { key }
    }

    /// The resolved vocabulary key.
    pub fn key(&self) -> LookupKey {
        self.key
    }
}

/// A loaded model handle.
///
/// # Implementations
///
/// - [`CandleWordModel`](super::CandleWordModel): safetensors weights + vocabulary file
/// - [`MockWordModel`](super::MockWordModel): in-memory model for tests
pub trait WordModel: Send + Sync {
    /// Human-readable model name, used in logs.
    fn name(&self) -> &str;

    /// Look up a string property attached to the model (e.g. `unknownToken`).
    fn property(&self, name: &str) -> Option<String>;

    /// The model's block, resolved once when the model was loaded.
    fn block(&self) -> ModelBlock;

    /// Open a new inference session on this model.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot allocate a session.
    fn new_runner(&self) -> Result<Box<dyn InferenceRunner>>;

    /// Release the model's resources. Called at most once, after every
    /// session created from it has been closed.
    fn close(&mut self);
}

/// A stateful inference session derived from a [`WordModel`].
#[async_trait]
pub trait InferenceRunner: Send + Sync {
    /// Run the model forward on a batch.
    ///
    /// Returns one vector per input, in the same order.
    ///
    /// # Errors
    ///
    /// Runner-specific failures (translation, execution, device errors).
    async fn predict(&self, batch: &[RawInput]) -> Result<Vec<EmbeddingVector>>;

    /// Release the session. Called at most once.
    fn close(&mut self);
}
