//! Configuration management for shaikh
//!
//! Configuration is read from TOML, then environment overrides
//! (`SHAIKH_SECTION__KEY=value`) are applied and the result is validated.

use crate::error::{Result, ShaikhError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";
const ENV_PREFIX: &str = "SHAIKH_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta", default)]
    pub meta: MetaConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at: current_timestamp(),
            last_modified: current_timestamp(),
        }
    }
}

/// Retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates fetched per requested result, across both branches
    pub over_fetch_multiplier: usize,
    pub rrf_k: f64,
    pub max_sub_queries: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            over_fetch_multiplier: 10,
            rrf_k: 60.0,
            max_sub_queries: 3,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: crate::embedding::DEFAULT_MODEL.to_string(),
            batch_size: 32,
        }
    }
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub vector_dim: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    pub max_elements: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
            max_elements: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Arabic,
    Plain,
}

impl std::str::FromStr for TokenizerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arabic" => Ok(TokenizerKind::Arabic),
            "plain" => Ok(TokenizerKind::Plain),
            other => Err(format!("Unknown tokenizer kind '{other}', expected 'arabic' or 'plain'")),
        }
    }
}

/// Lexical text normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub kind: TokenizerKind,
    /// JSON object whose keys are stopwords
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopwords_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "shaikh=info".to_string(),
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_dim: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_kind: Option<TokenizerKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub over_fetch_multiplier: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrf_k: Option<f64>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_inner(path, None)
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        Self::load_inner(path, Some(profile))
    }

    fn load_inner(path: &Path, profile: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return Err(ShaikhError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ShaikhError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        if let Some(profile) = profile {
            config.apply_profile(profile)?;
        }
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ShaikhError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ShaikhError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| ShaikhError::Config(format!("Unknown profile: {profile}")))?;

        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(dim) = overrides.vector_dim {
            self.indexing.vector_dim = dim;
        }
        if let Some(kind) = overrides.tokenizer_kind {
            self.tokenizer.kind = kind;
        }
        if let Some(multiplier) = overrides.over_fetch_multiplier {
            self.retrieval.over_fetch_multiplier = multiplier;
        }
        if let Some(k) = overrides.rrf_k {
            self.retrieval.rrf_k = k;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SHAIKH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "RETRIEVAL__OVER_FETCH_MULTIPLIER" => {
                self.retrieval.over_fetch_multiplier = parse(path, value)?;
            }
            "RETRIEVAL__RRF_K" => {
                self.retrieval.rrf_k = parse(path, value)?;
            }
            "RETRIEVAL__MAX_SUB_QUERIES" => {
                self.retrieval.max_sub_queries = parse(path, value)?;
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BATCH_SIZE" => {
                self.embedding.batch_size = parse(path, value)?;
            }
            "INDEXING__VECTOR_DIM" => {
                self.indexing.vector_dim = parse(path, value)?;
            }
            "INDEXING__HNSW_EF_SEARCH" => {
                self.indexing.hnsw_ef_search = parse(path, value)?;
            }
            "TOKENIZER__KIND" => {
                self.tokenizer.kind =
                    value
                        .parse()
                        .map_err(|message| ShaikhError::InvalidConfigValue {
                            path: path.to_string(),
                            message,
                        })?;
            }
            "TOKENIZER__STOPWORDS_FILE" => {
                self.tokenizer.stopwords_file = Some(PathBuf::from(value));
            }
            "LOGGING__FILTER" => {
                self.logging.filter = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ShaikhError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("shaikh").join("config.toml"))
    }
}

fn parse<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| ShaikhError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.retrieval.rrf_k = 30.0;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.rrf_k, 30.0);
        assert_eq!(loaded.embedding.model, "multilingual-e5-small");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nover_fetch_multiplier = 4\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retrieval.over_fetch_multiplier, 4);
        assert_eq!(config.retrieval.rrf_k, 60.0);
        assert_eq!(config.tokenizer.kind, TokenizerKind::Arabic);
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(&temp.path().join("absent.toml")),
            Err(ShaikhError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("SHAIKH_RETRIEVAL__RRF_K", "20"),
            ("SHAIKH_TOKENIZER__KIND", "plain"),
            ("SHAIKH_EMBEDDING__BATCH_SIZE", "not-a-number"),
            ("OTHER_RETRIEVAL__RRF_K", "1"),
        ]));

        assert_eq!(config.retrieval.rrf_k, 20.0);
        assert_eq!(config.tokenizer.kind, TokenizerKind::Plain);
        assert_eq!(config.embedding.batch_size, 32);
    }

    #[test]
    fn test_profiles() {
        let mut config = Config::default();
        config.profiles.insert(
            "english".to_string(),
            ProfileOverrides {
                embedding_model: Some("bge-base-en-v1.5".to_string()),
                vector_dim: Some(768),
                tokenizer_kind: Some(TokenizerKind::Plain),
                ..ProfileOverrides::default()
            },
        );

        config.apply_profile("english").unwrap();
        assert_eq!(config.embedding.model, "bge-base-en-v1.5");
        assert_eq!(config.indexing.vector_dim, 768);
        assert!(ConfigValidator::validate(&config).is_ok());

        assert!(config.apply_profile("missing").is_err());
    }
}
