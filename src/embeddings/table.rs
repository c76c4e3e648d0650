//! Read-only vocabulary → index table

use std::collections::HashMap;
use std::sync::Arc;

use super::error::{EmbeddingError, Result};

/// Opaque key for one vocabulary entry.
///
/// Only [`EmbeddingTable`] hands these out; runners read the row index
/// through [`LookupKey::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupKey(usize);

impl LookupKey {
    /// Row of the embedding matrix this key points at.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What a model's block turned out to be once loaded.
///
/// Resolved a single time when the model is opened, so the per-request path
/// never has to re-check the model's structure.
#[derive(Debug, Clone)]
pub enum ModelBlock {
    /// A pure embedding table.
    Embedding(Arc<EmbeddingTable>),
    /// Anything else; `kind` describes what was found.
    Other { kind: String },
}

/// Read-only mapping from words to embedding rows.
///
/// Shared between the model that produced it and the
/// [`EmbeddingService`](super::EmbeddingService) reading from it.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable {
    index: HashMap<String, usize>,
}

impl EmbeddingTable {
    /// Build a table from an ordered vocabulary.
    ///
    /// Each word gets its position as index. If a word appears twice the first
    /// occurrence keeps its index.
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = HashMap::new();
        for (i, word) in vocabulary.into_iter().enumerate() {
            index.entry(word.into()).or_insert(i);
        }
        Self { index }
    }

    /// Accept a model block only if it is an embedding table.
    pub fn from_block(block: ModelBlock) -> Result<Arc<Self>> {
        match block {
            ModelBlock::Embedding(table) => Ok(table),
            ModelBlock::Other { kind } => Err(EmbeddingError::InvalidModelShape { kind }),
        }
    }

    /// Whether `word` is part of the vocabulary.
    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    /// Key for `word`, or `None` when it is out of vocabulary.
    pub fn resolve_key(&self, word: &str) -> Option<LookupKey> {
        self.index.get(word).copied().map(LookupKey)
    }

    /// Number of words in the vocabulary.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the vocabulary has no words at all.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
