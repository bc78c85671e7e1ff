//! Hybrid search combining semantic and lexical retrieval per sub-query

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::embedding::{Embedder, EmbeddingError};
use crate::retrieval::assemble::{ResultAssembler, SearchResults};
use crate::retrieval::budget::RetrievalBudget;
use crate::retrieval::fanout::{GroupError, TaskGroup};
use crate::retrieval::filters::{FilterError, FilterValidator, SearchRequest, ValidatedRequest};
use crate::retrieval::fusion::{fuse, FusionConfig, FusionError};
use crate::retrieval::labels::LabelEncoder;
use crate::retrieval::parallel::{ParallelLexicalSearcher, ParallelSemanticSearcher, RankedLists};
use crate::retrieval::FusedResult;
use crate::store::{LexicalSearcher, SemanticQuery, SemanticSearcher, StoreError};
use crate::text::Tokenizer;

/// Pipeline stage a failure was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validation,
    Embedding,
    SemanticSearch,
    LexicalSearch,
    Fusion,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Embedding => "embedding",
            Stage::SemanticSearch => "semantic search",
            Stage::LexicalSearch => "lexical search",
            Stage::Fusion => "fusion",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] FilterError),

    #[error("Embedding generation failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Semantic search failed for sub-query {index}: {source}")]
    SemanticSearch { index: usize, source: StoreError },

    #[error("Lexical search failed for sub-query {index}: {source}")]
    LexicalSearch { index: usize, source: StoreError },

    #[error("Internal error during {stage}: {message}")]
    Internal { stage: Stage, message: String },
}

impl SearchError {
    pub fn stage(&self) -> Stage {
        match self {
            SearchError::InvalidRequest(_) => Stage::Validation,
            SearchError::Embedding(_) => Stage::Embedding,
            SearchError::SemanticSearch { .. } => Stage::SemanticSearch,
            SearchError::LexicalSearch { .. } => Stage::LexicalSearch,
            SearchError::Internal { stage, .. } => *stage,
        }
    }

    /// True when the caller's input was rejected, as opposed to a downstream
    /// or internal failure.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, SearchError::InvalidRequest(_))
    }

    pub(crate) fn from_group(stage: Stage, err: GroupError<SearchError>) -> Self {
        match err {
            GroupError::Failed { error, .. } => error,
            GroupError::Panicked { message } => SearchError::Internal {
                stage,
                message: format!("task panicked: {message}"),
            },
            GroupError::MissingResult { index } => SearchError::Internal {
                stage,
                message: format!("no result for sub-query {index}"),
            },
        }
    }
}

/// Hybrid searcher: validates, fans out both retrieval branches, fuses.
///
/// Holds only shared read-only collaborator handles; every call allocates its
/// own working state, so one searcher can serve concurrent calls.
pub struct HybridSearcher {
    embedder: Arc<dyn Embedder>,
    semantic: ParallelSemanticSearcher,
    lexical: ParallelLexicalSearcher,
    validator: FilterValidator,
    fusion: FusionConfig,
    over_fetch_multiplier: usize,
}

impl HybridSearcher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        semantic_store: Arc<dyn SemanticSearcher>,
        lexical_store: Arc<dyn LexicalSearcher>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        let defaults = RetrievalConfig::default();
        Self {
            embedder,
            semantic: ParallelSemanticSearcher::new(semantic_store),
            lexical: ParallelLexicalSearcher::new(lexical_store, tokenizer),
            validator: FilterValidator::new(defaults.max_sub_queries),
            fusion: FusionConfig::default(),
            over_fetch_multiplier: defaults.over_fetch_multiplier,
        }
    }

    /// Apply tuning from configuration.
    pub fn with_config(mut self, config: &RetrievalConfig) -> Result<Self, FusionError> {
        self.fusion = FusionConfig::new(config.rrf_k)?;
        self.validator = FilterValidator::new(config.max_sub_queries);
        self.over_fetch_multiplier = config.over_fetch_multiplier.max(1);
        Ok(self)
    }

    /// Search for passages relevant to each sub-query of `request`.
    ///
    /// Either every sub-query gets its fused list or the call fails as a
    /// whole.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError> {
        let span = info_span!(
            "search",
            request_id = %Uuid::new_v4(),
            sub_queries = request.sub_queries.len(),
            final_k = request.final_k,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &SearchRequest) -> Result<SearchResults, SearchError> {
        let started = Instant::now();

        let validated = self
            .validator
            .validate(request)
            .inspect_err(|e| warn!(error = %e, "Rejected search request"))?;

        let budget = RetrievalBudget::new(
            validated.final_k,
            validated.queries.len(),
            self.over_fetch_multiplier,
        );
        debug!(
            total_chunks = budget.total,
            chunks_per_query = budget.per_query,
            modes = ?validated.modes(),
            "Validated search request"
        );

        let (semantic, lexical) = tokio::try_join!(
            self.semantic_branch(&validated, budget.per_query),
            self.lexical.search(&validated.queries, budget.per_query),
        )?;

        let fused = self.fuse_all(semantic, lexical).await?;
        let results = ResultAssembler::assemble(&validated, fused)?;

        info!(
            candidates = results.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(results)
    }

    /// Embeds every sub-query in one batch, then searches with each vector
    /// and that sub-query's labels.
    async fn semantic_branch(
        &self,
        request: &ValidatedRequest,
        per_query: usize,
    ) -> Result<RankedLists, SearchError> {
        let texts: Vec<String> = request.queries.iter().map(|q| q.text.clone()).collect();
        let expected = texts.len();

        let embedder = Arc::clone(&self.embedder);
        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| SearchError::Internal {
                stage: Stage::Embedding,
                message: format!("embedding task failed: {e}"),
            })?
            .inspect_err(|e| warn!(error = %e, "Embedding failed"))?;

        if vectors.len() != expected {
            return Err(SearchError::Internal {
                stage: Stage::Embedding,
                message: format!("{} vectors for {} sub-queries", vectors.len(), expected),
            });
        }

        let queries = request
            .queries
            .iter()
            .zip(vectors)
            .map(|(query, vector)| SemanticQuery {
                vector,
                labels: LabelEncoder::encode(query),
            })
            .collect();

        self.semantic.search(queries, per_query).await
    }

    /// Runs RRF for every sub-query concurrently.
    async fn fuse_all(
        &self,
        semantic: RankedLists,
        lexical: RankedLists,
    ) -> Result<Vec<Vec<FusedResult>>, SearchError> {
        if semantic.len() != lexical.len() {
            return Err(SearchError::Internal {
                stage: Stage::Fusion,
                message: format!(
                    "{} semantic lists but {} lexical lists",
                    semantic.len(),
                    lexical.len()
                ),
            });
        }

        let started = Instant::now();
        debug!(num_of_tasks = semantic.len(), "Starting rank fusion");

        let mut group = TaskGroup::new();
        for (semantic, lexical) in semantic.into_iter().zip(lexical) {
            let config = self.fusion;
            group.spawn(async move { Ok::<_, SearchError>(fuse(semantic, lexical, &config)) });
        }

        let fused = group
            .join()
            .await
            .map_err(|e| SearchError::from_group(Stage::Fusion, e))?;

        debug!(
            duration_ms = started.elapsed().as_millis() as u64,
            "Rank fusion complete"
        );
        Ok(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::filters::SubQuery;
    use crate::store::{LexicalQuery, Passage};
    use crate::text::PlainTokenizer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
        drop_one: bool,
    }

    impl Embedder for CountingEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = if self.drop_one { texts.len() - 1 } else { texts.len() };
            Ok(vec![vec![1.0, 0.0]; n])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    struct Empty;

    #[async_trait]
    impl SemanticSearcher for Empty {
        async fn semantic_search(
            &self,
            _query: &SemanticQuery,
            _limit: usize,
        ) -> Result<Vec<Passage>, StoreError> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl LexicalSearcher for Empty {
        async fn lexical_search(
            &self,
            _query: &LexicalQuery,
            _limit: usize,
        ) -> Result<Vec<Passage>, StoreError> {
            Ok(vec![])
        }
    }

    fn searcher(embedder: Arc<CountingEmbedder>) -> HybridSearcher {
        HybridSearcher::new(
            embedder,
            Arc::new(Empty),
            Arc::new(Empty),
            Arc::new(PlainTokenizer::default()),
        )
    }

    fn embedder(drop_one: bool) -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            drop_one,
        })
    }

    #[tokio::test]
    async fn test_invalid_request_fails_before_io() {
        let embedder = embedder(false);
        let request = SearchRequest::new("p", vec![SubQuery::new("q").with_surah_range(5, 5)], 3);

        let err = searcher(embedder.clone()).search(&request).await.unwrap_err();
        assert!(err.is_invalid_request());
        assert_eq!(err.stage(), Stage::Validation);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_one_embedding_batch_per_call() {
        let embedder = embedder(false);
        let request = SearchRequest::new("p", vec![SubQuery::new("a"), SubQuery::new("b")], 3);

        let results = searcher(embedder.clone()).search(&request).await.unwrap();
        assert_eq!(results.groups().len(), 2);
        assert!(results.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_vector_count_mismatch_is_internal() {
        let request = SearchRequest::new("p", vec![SubQuery::new("a"), SubQuery::new("b")], 3);
        let err = searcher(embedder(true)).search(&request).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Internal {
                stage: Stage::Embedding,
                ..
            }
        ));
        assert!(!err.is_invalid_request());
    }

    #[test]
    fn test_with_config_rejects_bad_k() {
        let config = RetrievalConfig {
            rrf_k: 0.0,
            ..RetrievalConfig::default()
        };
        assert!(searcher(embedder(false)).with_config(&config).is_err());
    }
}
