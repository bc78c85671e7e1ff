//! Embedding collaborator: batch text-to-vector conversion.

mod provider;

pub use provider::{
    model_dimension, Embedder, EmbeddingError, FastEmbedProvider, DEFAULT_MODEL, SUPPORTED_MODELS,
};
