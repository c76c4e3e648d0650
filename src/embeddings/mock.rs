//! Mock model and runner for tests
//!
//! Everything lives in memory:
//! - the vocabulary and its vectors are configured up front
//! - every `predict` call is counted
//! - releases are recorded in order, so teardown can be asserted
//! - a closed runner refuses to run (sentinel for use-after-close)

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::table::{EmbeddingTable, ModelBlock};
use super::traits::{EmbeddingVector, InferenceRunner, RawInput, WordModel};
use super::UNKNOWN_TOKEN_PROPERTY;

/// Shared view on what the mock collaborators did.
///
/// Grab one with [`MockWordModel::probe`] before handing the model to a
/// service; it keeps observing after the model has been moved.
#[derive(Clone, Debug, Default)]
pub struct MockProbe {
    calls: Arc<AtomicUsize>,
    releases: Arc<Mutex<Vec<&'static str>>>,
}

impl MockProbe {
    /// Number of `predict` calls received by any runner of this model.
    pub fn predict_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Release events in the order they happened (`"runner"`, `"model"`).
    pub fn releases(&self) -> Vec<&'static str> {
        self.releases
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn record(&self, what: &'static str) {
        if let Ok(mut releases) = self.releases.lock() {
            releases.push(what);
        }
    }
}

/// In-memory [`WordModel`] for tests.
///
/// # Example
///
/// ```rust
/// use word_embedding::embeddings::{EmbeddingService, MockWordModel};
///
/// # tokio_test::block_on(async {
/// let service = EmbeddingService::new(Box::new(MockWordModel::pets())).unwrap();
///
/// assert_eq!(service.embed_word("cat").await.unwrap(), vec![0.1, 0.2]);
/// // Out-of-vocabulary words fall back to `<unk>`
/// assert_eq!(service.embed_word("fish").await.unwrap(), vec![0.0, 0.0]);
/// # });
/// ```
#[derive(Debug)]
pub struct MockWordModel {
    properties: HashMap<String, String>,
    block: ModelBlock,
    vectors: HashMap<usize, EmbeddingVector>,
    failure: Option<String>,
    refuse_sessions: bool,
    probe: MockProbe,
}

impl MockWordModel {
    /// Create a model whose vocabulary is `vocabulary`, indexed by position.
    ///
    /// No unknown token and no vectors are configured yet.
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            properties: HashMap::new(),
            block: ModelBlock::Embedding(Arc::new(EmbeddingTable::new(vocabulary.iter().copied()))),
            vectors: HashMap::new(),
            failure: None,
            refuse_sessions: false,
            probe: MockProbe::default(),
        }
    }

    /// The `cat` / `dog` / `<unk>` model: 0 → [0.1, 0.2], 1 → [0.3, 0.4], 2 → [0.0, 0.0].
    pub fn pets() -> Self {
        Self::new(&["cat", "dog", "<unk>"])
            .with_unknown_token("<unk>")
            .with_vector(0, vec![0.1, 0.2])
            .with_vector(1, vec![0.3, 0.4])
            .with_vector(2, vec![0.0, 0.0])
    }

    pub fn with_unknown_token(self, token: &str) -> Self {
        self.with_property(UNKNOWN_TOKEN_PROPERTY, token)
    }

    pub fn with_property(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    /// Vector the runner returns for row `index`.
    pub fn with_vector(mut self, index: usize, vector: EmbeddingVector) -> Self {
        self.vectors.insert(index, vector);
        self
    }

    /// Replace the block, e.g. with [`ModelBlock::Other`].
    pub fn with_block(mut self, block: ModelBlock) -> Self {
        self.block = block;
        self
    }

    /// Make every `predict` call fail with `message`.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Make `new_runner` fail.
    pub fn refusing_sessions(mut self) -> Self {
        self.refuse_sessions = true;
        self
    }

    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }
}

impl WordModel for MockWordModel {
    fn name(&self) -> &str {
        "mock-word-model"
    }

    fn property(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn block(&self) -> ModelBlock {
        self.block.clone()
    }

    fn new_runner(&self) -> Result<Box<dyn InferenceRunner>> {
        if self.refuse_sessions {
            bail!("mock runtime refused to open a session");
        }
        Ok(Box::new(MockInferenceRunner {
            vectors: self.vectors.clone(),
            failure: self.failure.clone(),
            closed: false,
            probe: self.probe.clone(),
        }))
    }

    fn close(&mut self) {
        self.probe.record("model");
    }
}

/// Runner created by [`MockWordModel::new_runner`].
#[derive(Debug)]
pub struct MockInferenceRunner {
    vectors: HashMap<usize, EmbeddingVector>,
    failure: Option<String>,
    closed: bool,
    probe: MockProbe,
}

#[async_trait]
impl InferenceRunner for MockInferenceRunner {
    async fn predict(&self, batch: &[RawInput]) -> Result<Vec<EmbeddingVector>> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);

        if self.closed {
            bail!("mock runner invoked after close");
        }
        if let Some(message) = &self.failure {
            bail!("{}", message);
        }

        batch
            .iter()
            .map(|input| {
                let index = input.key().index();
                self.vectors
                    .get(&index)
                    .cloned()
                    .ok_or_else(|| anyhow!("no vector configured for row {}", index))
            })
            .collect()
    }

    fn close(&mut self) {
        self.closed = true;
        self.probe.record("runner");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(model: &MockWordModel, word: &str) -> RawInput {
        match model.block() {
            ModelBlock::Embedding(table) => RawInput::new(table.resolve_key(word).unwrap()),
            ModelBlock::Other { .. } => panic!("pets model must be an embedding"),
        }
    }

    #[tokio::test]
    async fn test_runner_returns_configured_vectors_in_order() {
        let model = MockWordModel::pets();
        let runner = model.new_runner().unwrap();
        let batch = [input(&model, "dog"), input(&model, "cat")];

        let out = runner.predict(&batch).await.unwrap();
        assert_eq!(out, vec![vec![0.3, 0.4], vec![0.1, 0.2]]);
        assert_eq!(model.probe().predict_calls(), 1);
    }

    #[tokio::test]
    async fn test_runner_missing_vector_is_error() {
        let model = MockWordModel::new(&["a"]);
        let runner = model.new_runner().unwrap();
        let err = runner.predict(&[input(&model, "a")]).await.unwrap_err();
        assert!(err.to_string().contains("row 0"));
    }

    #[tokio::test]
    async fn test_closed_runner_refuses_work() {
        let model = MockWordModel::pets();
        let mut runner = model.new_runner().unwrap();
        runner.close();
        assert!(runner.predict(&[input(&model, "cat")]).await.is_err());
        assert_eq!(model.probe().releases(), vec!["runner"]);
    }

    #[test]
    fn test_refusing_sessions() {
        let model = MockWordModel::pets().refusing_sessions();
        assert!(model.new_runner().is_err());
    }

    #[test]
    fn test_properties() {
        let model = MockWordModel::pets().with_property("dimension", "2");
        assert_eq!(model.property("unknownToken").as_deref(), Some("<unk>"));
        assert_eq!(model.property("dimension").as_deref(), Some("2"));
        assert_eq!(model.property("missing"), None);
    }
}
