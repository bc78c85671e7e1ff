use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::{model_dimension, SUPPORTED_MODELS};
use crate::error::{Result, ShaikhError, ValidationError};
use crate::retrieval::filters::MAX_SUB_QUERIES;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every violation at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_tokenizer(config, &mut errors);

        if config.logging.filter.trim().is_empty() {
            errors.push(ValidationError::new(
                "logging.filter",
                "Log filter cannot be empty",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ShaikhError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.over_fetch_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.over_fetch_multiplier",
                "Over-fetch multiplier must be greater than 0",
            ));
        }

        if !retrieval.rrf_k.is_finite() || retrieval.rrf_k <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                format!("RRF k must be a positive number, got {}", retrieval.rrf_k),
            ));
        }

        if !(1..=MAX_SUB_QUERIES).contains(&retrieval.max_sub_queries) {
            errors.push(ValidationError::new(
                "retrieval.max_sub_queries",
                format!(
                    "Max sub-queries must be between 1 and {}, got {}",
                    MAX_SUB_QUERIES, retrieval.max_sub_queries
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        match model_dimension(&config.embedding.model) {
            None => errors.push(ValidationError::new(
                "embedding.model",
                format!(
                    "Model must be one of {:?}, got '{}'",
                    SUPPORTED_MODELS, config.embedding.model
                ),
            )),
            Some(dim) if dim != config.indexing.vector_dim => errors.push(ValidationError::new(
                "indexing.vector_dim",
                format!(
                    "Model {} produces {}-dimensional vectors, but vector_dim is {}",
                    config.embedding.model, dim, config.indexing.vector_dim
                ),
            )),
            Some(_) => {}
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        let indexing = &config.indexing;
        let positive = [
            ("indexing.vector_dim", indexing.vector_dim),
            ("indexing.hnsw_m", indexing.hnsw_m),
            ("indexing.hnsw_ef_construction", indexing.hnsw_ef_construction),
            ("indexing.hnsw_ef_search", indexing.hnsw_ef_search),
            ("indexing.max_elements", indexing.max_elements),
        ];

        for (path, value) in positive {
            if value == 0 {
                errors.push(ValidationError::new(path, "Must be greater than 0"));
            }
        }
    }

    fn validate_tokenizer(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the tokenizer is built.
        if let Some(path) = &config.tokenizer.stopwords_file {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    "tokenizer.stopwords_file",
                    "Stopwords file path cannot be empty",
                ));
            }
        }
    }
}
