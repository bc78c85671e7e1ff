/// Embedding collaborator trait and FastEmbed implementation
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Batch embedding of texts.
///
/// Implementations return one vector per input text, in input order, and fail
/// the whole batch on any error. Calls are synchronous; async callers should
/// run them on the blocking pool.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

struct ModelSpec {
    name: &'static str,
    model: EmbeddingModel,
    dimension: usize,
    size_mb: usize,
}

fn model_specs() -> [ModelSpec; 5] {
    [
        ModelSpec {
            name: "multilingual-e5-small",
            model: EmbeddingModel::MultilingualE5Small,
            dimension: 384,
            size_mb: 470,
        },
        ModelSpec {
            name: "multilingual-e5-base",
            model: EmbeddingModel::MultilingualE5Base,
            dimension: 768,
            size_mb: 1100,
        },
        ModelSpec {
            name: "all-MiniLM-L6-v2",
            model: EmbeddingModel::AllMiniLML6V2,
            dimension: 384,
            size_mb: 90,
        },
        ModelSpec {
            name: "bge-small-en-v1.5",
            model: EmbeddingModel::BGESmallENV15,
            dimension: 384,
            size_mb: 130,
        },
        ModelSpec {
            name: "bge-base-en-v1.5",
            model: EmbeddingModel::BGEBaseENV15,
            dimension: 768,
            size_mb: 440,
        },
    ]
}

/// Names accepted by [`FastEmbedProvider::new`].
pub const SUPPORTED_MODELS: [&str; 5] = [
    "multilingual-e5-small",
    "multilingual-e5-base",
    "all-MiniLM-L6-v2",
    "bge-small-en-v1.5",
    "bge-base-en-v1.5",
];

pub const DEFAULT_MODEL: &str = "multilingual-e5-small";

/// Output dimension of a supported model.
pub fn model_dimension(model_name: &str) -> Option<usize> {
    model_specs()
        .into_iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(model_name))
        .map(|spec| spec.dimension)
}

/// FastEmbed provider for local embedding generation
///
/// Models are downloaded on first use to the huggingface cache. The default
/// multilingual model handles Arabic passages.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let spec = model_specs()
            .into_iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(model_name))
            .ok_or_else(|| {
                EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: {}",
                    model_name,
                    SUPPORTED_MODELS.join(", ")
                ))
            })?;

        tracing::info!(
            "Initializing embedding model: {} ({}D, ~{}MB download if not cached)",
            spec.name,
            spec.dimension,
            spec.size_mb
        );

        let init_options = InitOptions::new(spec.model).with_show_download_progress(true);
        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: spec.name.to_string(),
            dimension: spec.dimension,
        })
    }

    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new(DEFAULT_MODEL)
    }
}

impl Embedder for FastEmbedProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        // Dropping blank inputs would shift the output order.
        if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!("text {i} is empty")));
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }
        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_dimensions() {
        assert_eq!(model_dimension("multilingual-e5-small"), Some(384));
        assert_eq!(model_dimension("bge-base-en-v1.5"), Some(768));
        assert_eq!(model_dimension("all-minilm-l6-v2"), Some(384));
        assert_eq!(model_dimension("word2vec"), None);
        for name in SUPPORTED_MODELS {
            assert!(model_dimension(name).is_some(), "{name}");
        }
    }

    #[test]
    fn test_unsupported_model() {
        assert!(matches!(
            FastEmbedProvider::new("word2vec"),
            Err(EmbeddingError::InitializationError(_))
        ));
    }

    #[test]
    #[ignore] // Requires model download - run with: cargo test -- --ignored
    fn test_batch_embedding_preserves_order() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec![
            "آية الكرسي".to_string(),
            "The throne verse.".to_string(),
            "آية الكرسي".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0], embeddings[2]);
        assert!(embeddings.iter().all(|e| e.len() == 384));
    }

    #[test]
    #[ignore] // Requires model download - run with: cargo test -- --ignored
    fn test_blank_text_rejected() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec!["first".to_string(), " ".to_string()];
        assert!(matches!(
            provider.embed_batch(&texts),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }
}
