//! Word embedding service
//!
//! Splits a lookup into two steps with very different costs:
//! 1. **Preparation** (`prepare_input`): vocabulary lookup with unknown-token
//!    fallback. Pure, never touches the model.
//! 2. **Embedding** (`embed`): one forward pass of the inference runner on a
//!    single-item batch.
//!
//! The service owns the model handle and the inference session created from
//! it, and releases both (session first) on `close()` or drop.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::debug;

use super::error::{EmbeddingError, Result};
use super::table::EmbeddingTable;
use super::traits::{EmbeddingVector, InferenceRunner, RawInput, WordModel};

/// Model property holding the out-of-vocabulary fallback token.
pub const UNKNOWN_TOKEN_PROPERTY: &str = "unknownToken";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

/// Word embedding lookup over a loaded [`WordModel`].
///
/// Every operation except [`close`](Self::close) and
/// [`unembed`](Self::unembed) fails with [`EmbeddingError::Closed`] once the
/// service has been closed.
pub struct EmbeddingService {
    model: Box<dyn WordModel>,
    runner: Box<dyn InferenceRunner>,
    table: Arc<EmbeddingTable>,
    unknown_token: String,
    state: State,
}

impl EmbeddingService {
    /// Open a service on `model`.
    ///
    /// Reads the `unknownToken` property, checks that the model's block is an
    /// embedding table and opens an inference session. The model is closed
    /// again if any of these steps fails.
    ///
    /// # Errors
    ///
    /// - [`EmbeddingError::MissingProperty`] if `unknownToken` is not set
    /// - [`EmbeddingError::InvalidModelShape`] if the block is not an embedding
    /// - [`EmbeddingError::ModelLoad`] if no session could be opened
    pub fn new(mut model: Box<dyn WordModel>) -> Result<Self> {
        let (table, unknown_token, runner) = match Self::open(model.as_ref()) {
            Ok(parts) => parts,
            Err(e) => {
                model.close();
                return Err(e);
            }
        };

        debug!(
            model = model.name(),
            vocabulary = table.len(),
            unknown_token = %unknown_token,
            "Embedding service opened"
        );

        Ok(Self {
            model,
            runner,
            table,
            unknown_token,
            state: State::Open,
        })
    }

    fn open(
        model: &dyn WordModel,
    ) -> Result<(Arc<EmbeddingTable>, String, Box<dyn InferenceRunner>)> {
        let unknown_token = model
            .property(UNKNOWN_TOKEN_PROPERTY)
            .ok_or_else(|| EmbeddingError::MissingProperty(UNKNOWN_TOKEN_PROPERTY.to_string()))?;
        let table = EmbeddingTable::from_block(model.block())?;
        let runner = model.new_runner().map_err(EmbeddingError::ModelLoad)?;
        Ok((table, unknown_token, runner))
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Closed => Err(EmbeddingError::Closed),
        }
    }

    /// Whether `word` is part of the model vocabulary.
    pub fn is_known(&self, word: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.table.contains(word))
    }

    /// Resolve `word` into a model input, falling back to the unknown token
    /// for out-of-vocabulary words.
    ///
    /// # Errors
    ///
    /// [`EmbeddingError::UnknownTokenNotInVocabulary`] when fallback is needed
    /// and the model's unknown token is missing from its own vocabulary.
    pub fn prepare_input(&self, word: &str) -> Result<RawInput> {
        self.ensure_open()?;

        let lookup = if self.table.contains(word) {
            word
        } else {
            self.unknown_token.as_str()
        };

        self.table
            .resolve_key(lookup)
            .map(RawInput::new)
            .ok_or_else(|| EmbeddingError::UnknownTokenNotInVocabulary(self.unknown_token.clone()))
    }

    /// Run the model on a single prepared input.
    ///
    /// The runner is called exactly once; failures are not retried.
    pub async fn embed(&self, input: &RawInput) -> Result<EmbeddingVector> {
        self.ensure_open()?;

        let outputs = self
            .runner
            .predict(std::slice::from_ref(input))
            .await
            .map_err(EmbeddingError::EmbeddingComputation)?;

        single_output(outputs)
    }

    /// Prepare and embed `word` in one call.
    pub async fn embed_word(&self, word: &str) -> Result<EmbeddingVector> {
        let input = self.prepare_input(word)?;
        self.embed(&input).await
    }

    /// Reverse lookup (vector → word). Not supported.
    pub fn unembed(&self, _vector: &[f32]) -> Result<String> {
        Err(EmbeddingError::UnsupportedOperation("unembed"))
    }

    /// The token used for out-of-vocabulary words.
    pub fn unknown_token(&self) -> &str {
        &self.unknown_token
    }

    /// The vocabulary table shared with the model.
    pub fn table(&self) -> &Arc<EmbeddingTable> {
        &self.table
    }

    /// Whether [`close`](Self::close) has already run.
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Release the inference session, then the model.
    ///
    /// Safe to call more than once; only the first call releases anything.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.state = State::Closed;

        debug!(model = self.model.name(), "Releasing embedding service");
        self.runner.close();
        self.model.close();
    }
}

impl Drop for EmbeddingService {
    fn drop(&mut self) {
        self.close();
    }
}

fn single_output(outputs: Vec<EmbeddingVector>) -> Result<EmbeddingVector> {
    let count = outputs.len();
    let mut outputs = outputs.into_iter();
    match (outputs.next(), outputs.next()) {
        (Some(vector), None) => Ok(vector),
        _ => Err(EmbeddingError::EmbeddingComputation(anyhow!(
            "expected exactly one embedding, runner returned {}",
            count
        ))),
    }
}
