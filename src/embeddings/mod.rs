//! Word embedding lookup
//!
//! Turns words into vectors using a trained embedding model, with a reserved
//! unknown token standing in for out-of-vocabulary words.
//!
//! Architecture follows the project pattern (trait + impl + mock):
//! - `EmbeddingTable`: read-only vocabulary → row index mapping
//! - `EmbeddingService`: lookup, fallback, inference, resource lifecycle
//! - `WordModel` / `InferenceRunner` traits: the external model runtime
//! - `CandleWordModel`: safetensors weights + candle forward pass
//! - `MockWordModel`: deterministic in-memory model for tests

pub mod candle;
pub mod error;
pub mod mock;
pub mod service;
pub mod table;
pub mod traits;

pub use self::candle::{CandleRunner, CandleWordModel, ModelManifest};
pub use error::{EmbeddingError, Result};
pub use mock::{MockInferenceRunner, MockProbe, MockWordModel};
pub use service::{EmbeddingService, UNKNOWN_TOKEN_PROPERTY};
pub use table::{EmbeddingTable, LookupKey, ModelBlock};
pub use traits::{EmbeddingVector, InferenceRunner, RawInput, WordModel};
