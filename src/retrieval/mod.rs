//! Hybrid retrieval and rank fusion
//!
//! Validates a decomposed request, runs semantic and lexical search for every
//! sub-query concurrently, and merges each sub-query's two ranked lists with
//! Reciprocal Rank Fusion.

mod assemble;
pub mod budget;
pub mod fanout;
pub mod filters;
pub mod fusion;
mod hybrid;
pub mod labels;
mod parallel;

pub use assemble::{FusedGroup, ResultAssembler, SearchResults};
pub use budget::RetrievalBudget;
pub use filters::{
    AyahRange, ContentType, FilterError, FilterMode, FilterValidator, SearchRequest, Source,
    SubQuery, SurahRange, SurahScope, ValidatedRequest, ValidatedSubQuery,
};
pub use fusion::{fuse, reciprocal_rank_fusion, FusionConfig, FusionError};
pub use hybrid::{HybridSearcher, SearchError, Stage};
pub use labels::{FacetLabel, LabelEncoder};
pub use parallel::{ParallelLexicalSearcher, ParallelSemanticSearcher, RankedLists};

use serde::{Deserialize, Serialize};

use crate::store::{Passage, PassageId};

/// A passage that survived fusion, with its combined RRF score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: PassageId,
    pub relevance: f64,
    pub content: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surah: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ayah: Option<u16>,
}

impl FusedResult {
    pub fn from_passage(passage: Passage, relevance: f64) -> Self {
        Self {
            id: passage.id,
            relevance,
            content: passage.content,
            source: passage.source,
            surah: passage.surah,
            ayah: passage.ayah,
        }
    }
}
