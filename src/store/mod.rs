//! Storage collaborators consumed by the retrieval pipeline.
//!
//! The pipeline only sees the two search traits below. [`VectorStore`] and
//! [`KeywordIndex`] are the in-process implementations shipped with the
//! crate; a remote database would implement the same traits.

mod corpus;
mod keyword_index;
mod vector_index;

pub use corpus::{Corpus, CorpusRecord, IndexStats};
pub use keyword_index::KeywordIndex;
pub use vector_index::VectorStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retrieval::filters::{ContentType, Source};
use crate::retrieval::labels::{FacetLabel, LabelEncoder};

/// Passage identifier as stored upstream.
pub type PassageId = i64;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Duplicate passage id: {0}")]
    DuplicateId(PassageId),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Display payload of one retrievable chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub content: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surah: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ayah: Option<u16>,
}

/// A passage together with the facets it is indexed under.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPassage {
    pub passage: Passage,
    pub content_type: Option<ContentType>,
    pub source: Option<Source>,
}

impl IndexedPassage {
    pub fn labels(&self) -> Vec<FacetLabel> {
        LabelEncoder::encode_passage(
            self.content_type,
            self.source,
            self.passage.surah,
            self.passage.ayah,
        )
    }
}

/// Structured filter columns for lexical search. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalFilters {
    pub content_type: Option<ContentType>,
    pub source: Option<Source>,
    pub surah_start: Option<u16>,
    pub surah_end: Option<u16>,
    pub surah: Option<u16>,
    pub ayah_start: Option<u16>,
    pub ayah_end: Option<u16>,
}

impl LexicalFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticQuery {
    pub vector: Vec<f32>,
    /// Facet labels; empty means unfiltered
    pub labels: Vec<FacetLabel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalQuery {
    /// Normalized query text
    pub text: String,
    pub filters: LexicalFilters,
}

/// Nearest-neighbour search over passage embeddings.
#[async_trait]
pub trait SemanticSearcher: Send + Sync {
    /// Up to `limit` passages matching `query.labels`, most similar first.
    async fn semantic_search(
        &self,
        query: &SemanticQuery,
        limit: usize,
    ) -> Result<Vec<Passage>, StoreError>;
}

/// Text relevance search over normalized passage text.
#[async_trait]
pub trait LexicalSearcher: Send + Sync {
    /// Up to `limit` passages matching `query.filters`, most relevant first.
    async fn lexical_search(
        &self,
        query: &LexicalQuery,
        limit: usize,
    ) -> Result<Vec<Passage>, StoreError>;
}
