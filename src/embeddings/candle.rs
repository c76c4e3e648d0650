//! Local word model backed by candle (safetensors weights)
//!
//! A model directory looks like:
//! - `model.yaml`: manifest (name, file names, string properties)
//! - `model.safetensors`: weights holding a single `[vocabulary, dimensions]` matrix
//! - `vocab.txt`: one token per line, the line number is the matrix row
//!
//! Example manifest:
//!
//! ```yaml
//! name: glove-50d
//! tensor: embedding
//! properties:
//!   unknownToken: "<unk>"
//! ```
//!
//! The forward pass is a `candle_nn::Embedding` lookup on the CPU, dispatched
//! to `tokio::spawn_blocking` so it never stalls the async runtime.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Embedding, Module};
use serde::Deserialize;

use super::table::{EmbeddingTable, ModelBlock};
use super::traits::{EmbeddingVector, InferenceRunner, RawInput, WordModel};

/// Manifest file name inside a model directory.
pub const MANIFEST_FILE: &str = "model.yaml";

/// `model.yaml` contents. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelManifest {
    pub name: String,
    /// Safetensors file, relative to the model directory.
    pub weights: String,
    /// Vocabulary file, relative to the model directory.
    pub vocabulary: String,
    /// Name of the embedding matrix inside the weights file.
    pub tensor: String,
    pub properties: HashMap<String, String>,
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            name: "word-embedding".into(),
            weights: "model.safetensors".into(),
            vocabulary: "vocab.txt".into(),
            tensor: "embedding".into(),
            properties: HashMap::new(),
        }
    }
}

impl ModelManifest {
    /// Read `model.yaml` from `dir`, or use defaults if there is none.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No manifest at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

/// Decide whether `tensors` is exactly one embedding matrix, named
/// `tensor_name`, for `vocabulary`. Returns the block and, for embeddings,
/// the ready layer.
fn resolve_block(
    tensors: &HashMap<String, Tensor>,
    tensor_name: &str,
    vocabulary: Vec<String>,
) -> (ModelBlock, Option<Embedding>) {
    let Some(weights) = tensors.get(tensor_name) else {
        let mut names: Vec<&str> = tensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        return (
            ModelBlock::Other {
                kind: format!("no `{}` tensor among [{}]", tensor_name, names.join(", ")),
            },
            None,
        );
    };

    // A pure embedding model holds the matrix and nothing else
    let mut extra: Vec<&str> = tensors
        .keys()
        .map(String::as_str)
        .filter(|name| *name != tensor_name)
        .collect();
    if !extra.is_empty() {
        extra.sort_unstable();
        return (
            ModelBlock::Other {
                kind: format!(
                    "tensor `{}` alongside other tensors [{}]",
                    tensor_name,
                    extra.join(", ")
                ),
            },
            None,
        );
    }

    let (rows, dimensions) = match weights.dims2() {
        Ok(shape) => shape,
        Err(_) => {
            return (
                ModelBlock::Other {
                    kind: format!("tensor `{}` of shape {:?}", tensor_name, weights.dims()),
                },
                None,
            )
        }
    };

    if rows != vocabulary.len() {
        return (
            ModelBlock::Other {
                kind: format!(
                    "tensor `{}` with {} rows for {} vocabulary entries",
                    tensor_name,
                    rows,
                    vocabulary.len()
                ),
            },
            None,
        );
    }

    (
        ModelBlock::Embedding(Arc::new(EmbeddingTable::new(vocabulary))),
        Some(Embedding::new(weights.clone(), dimensions)),
    )
}

/// Word model loaded from a safetensors directory.
///
/// # Example
///
/// ```rust,ignore
/// use word_embedding::embeddings::{CandleWordModel, EmbeddingService};
///
/// let model = CandleWordModel::load("./model")?;
/// let service = EmbeddingService::new(Box::new(model))?;
/// let vector = service.embed_word("cat").await?;
/// ```
pub struct CandleWordModel {
    name: String,
    properties: HashMap<String, String>,
    block: ModelBlock,
    weights: Option<Embedding>,
}

impl CandleWordModel {
    /// Load the model stored in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest, vocabulary or weights cannot be read.
    /// A weights file that does not hold a matching embedding matrix still
    /// loads; it is reported as [`ModelBlock::Other`].
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest = ModelManifest::load(dir)?;

        let vocab_path = dir.join(&manifest.vocabulary);
        let vocabulary: Vec<String> = std::fs::read_to_string(&vocab_path)
            .with_context(|| format!("Failed to read vocabulary {}", vocab_path.display()))?
            .lines()
            .map(str::to_string)
            .collect();

        let weights_path = dir.join(&manifest.weights);
        let tensors = candle_core::safetensors::load(&weights_path, &Device::Cpu)
            .with_context(|| format!("Failed to load weights {}", weights_path.display()))?;

        Ok(Self::from_tensors(manifest, vocabulary, &tensors))
    }

    /// Build a model from already-loaded tensors.
    pub fn from_tensors(
        manifest: ModelManifest,
        vocabulary: Vec<String>,
        tensors: &HashMap<String, Tensor>,
    ) -> Self {
        let vocabulary_len = vocabulary.len();
        let (block, weights) = resolve_block(tensors, &manifest.tensor, vocabulary);

        match &block {
            ModelBlock::Embedding(_) => tracing::info!(
                model = %manifest.name,
                vocabulary = vocabulary_len,
                "Candle word model loaded"
            ),
            ModelBlock::Other { kind } => tracing::warn!(
                model = %manifest.name,
                found = %kind,
                "Weights do not hold an embedding matrix"
            ),
        }

        Self {
            name: manifest.name,
            properties: manifest.properties,
            block,
            weights,
        }
    }
}

impl WordModel for CandleWordModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn property(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn block(&self) -> ModelBlock {
        self.block.clone()
    }

    fn new_runner(&self) -> Result<Box<dyn InferenceRunner>> {
        let Some(embedding) = &self.weights else {
            bail!("model `{}` has no embedding weights loaded", self.name);
        };
        Ok(Box::new(CandleRunner {
            embedding: Some(embedding.clone()),
        }))
    }

    fn close(&mut self) {
        self.weights = None;
        tracing::debug!(model = %self.name, "Candle word model released");
    }
}

/// Inference session over a [`CandleWordModel`].
pub struct CandleRunner {
    embedding: Option<Embedding>,
}

fn forward(embedding: &Embedding, rows: &[u32]) -> candle_core::Result<Vec<Vec<f32>>> {
    let ids = Tensor::new(rows, &Device::Cpu)?;
    embedding.forward(&ids)?.to_dtype(DType::F32)?.to_vec2::<f32>()
}

#[async_trait]
impl InferenceRunner for CandleRunner {
    async fn predict(&self, batch: &[RawInput]) -> Result<Vec<EmbeddingVector>> {
        let Some(embedding) = &self.embedding else {
            bail!("candle runner is closed");
        };
        if batch.is_empty() {
            return Ok(vec![]);
        }

        let rows = batch
            .iter()
            .map(|input| u32::try_from(input.key().index()))
            .collect::<std::result::Result<Vec<u32>, _>>()
            .context("Row index does not fit in u32")?;
        let embedding = embedding.clone();

        tokio::task::spawn_blocking(move || forward(&embedding, &rows))
            .await
            .context("Candle spawn_blocking panicked")?
            .context("Candle forward pass failed")
    }

    fn close(&mut self) {
        self.embedding = None;
    }
}
