//! Per-sub-query fan-out against the storage collaborators.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::retrieval::fanout::TaskGroup;
use crate::retrieval::filters::ValidatedSubQuery;
use crate::retrieval::hybrid::{SearchError, Stage};
use crate::store::{LexicalQuery, LexicalSearcher, Passage, SemanticQuery, SemanticSearcher};
use crate::text::Tokenizer;

/// Ranked lists, one per sub-query, in sub-query order.
pub type RankedLists = Vec<Vec<Passage>>;

/// Runs one semantic search per sub-query concurrently.
#[derive(Clone)]
pub struct ParallelSemanticSearcher {
    store: Arc<dyn SemanticSearcher>,
}

impl ParallelSemanticSearcher {
    pub fn new(store: Arc<dyn SemanticSearcher>) -> Self {
        Self { store }
    }

    /// `queries[i]` is searched with up to `per_query` results into slot `i`.
    pub async fn search(
        &self,
        queries: Vec<SemanticQuery>,
        per_query: usize,
    ) -> Result<RankedLists, SearchError> {
        let started = Instant::now();
        debug!(
            chunks_per_query = per_query,
            num_of_tasks = queries.len(),
            "Starting semantic search"
        );

        let mut group = TaskGroup::new();
        for (index, query) in queries.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            group.spawn(async move {
                store
                    .semantic_search(&query, per_query)
                    .await
                    .map_err(|source| SearchError::SemanticSearch { index, source })
            });
        }

        let lists = group
            .join()
            .await
            .map_err(|e| SearchError::from_group(Stage::SemanticSearch, e))
            .inspect_err(|e| warn!(error = %e, "Semantic search failed"))?;

        debug!(
            duration_ms = started.elapsed().as_millis() as u64,
            "Semantic search complete"
        );
        Ok(lists)
    }
}

/// Runs one lexical search per sub-query concurrently.
///
/// Query text is normalized inside each task before the store call.
#[derive(Clone)]
pub struct ParallelLexicalSearcher {
    store: Arc<dyn LexicalSearcher>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl ParallelLexicalSearcher {
    pub fn new(store: Arc<dyn LexicalSearcher>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { store, tokenizer }
    }

    pub async fn search(
        &self,
        queries: &[ValidatedSubQuery],
        per_query: usize,
    ) -> Result<RankedLists, SearchError> {
        let started = Instant::now();
        debug!(
            chunks_per_query = per_query,
            num_of_tasks = queries.len(),
            "Starting lexical search"
        );

        let mut group = TaskGroup::new();
        for (index, sub_query) in queries.iter().enumerate() {
            let store = Arc::clone(&self.store);
            let tokenizer = Arc::clone(&self.tokenizer);
            let raw = sub_query.text.clone();
            let filters = sub_query.lexical_filters();

            group.spawn(async move {
                let query = LexicalQuery {
                    text: tokenizer.tokenize(&raw),
                    filters,
                };
                store
                    .lexical_search(&query, per_query)
                    .await
                    .map_err(|source| SearchError::LexicalSearch { index, source })
            });
        }

        let lists = group
            .join()
            .await
            .map_err(|e| SearchError::from_group(Stage::LexicalSearch, e))
            .inspect_err(|e| warn!(error = %e, "Lexical search failed"))?;

        debug!(
            duration_ms = started.elapsed().as_millis() as u64,
            "Lexical search complete"
        );
        Ok(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::filters::{FilterValidator, SearchRequest, SubQuery};
    use crate::store::StoreError;
    use crate::text::PlainTokenizer;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn passage(id: i64) -> Passage {
        Passage {
            id,
            content: format!("p{id}"),
            source: String::new(),
            surah: None,
            ayah: None,
        }
    }

    /// Returns `[first label value]` after sleeping longer for earlier queries.
    struct SlowFirst;

    #[async_trait]
    impl SemanticSearcher for SlowFirst {
        async fn semantic_search(
            &self,
            query: &SemanticQuery,
            limit: usize,
        ) -> Result<Vec<Passage>, StoreError> {
            let id = query.vector[0] as i64;
            tokio::time::sleep(Duration::from_millis(40 - 10 * id as u64)).await;
            Ok(vec![passage(id); limit.min(1)])
        }
    }

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl LexicalSearcher for Recording {
        async fn lexical_search(
            &self,
            query: &LexicalQuery,
            limit: usize,
        ) -> Result<Vec<Passage>, StoreError> {
            self.seen.lock().push((query.text.clone(), limit));
            if query.text.contains("fail") {
                return Err(StoreError::Unavailable("down".to_string()));
            }
            Ok(vec![passage(query.text.len() as i64)])
        }
    }

    fn validated(texts: &[&str]) -> Vec<ValidatedSubQuery> {
        let request = SearchRequest::new(
            "p",
            texts.iter().map(|t| SubQuery::new(*t)).collect(),
            1,
        );
        FilterValidator::default().validate(&request).unwrap().queries
    }

    #[tokio::test]
    async fn test_semantic_slots_follow_sub_query_order() {
        let searcher = ParallelSemanticSearcher::new(Arc::new(SlowFirst));
        let queries = (0..3)
            .map(|i| SemanticQuery {
                vector: vec![i as f32],
                labels: vec![],
            })
            .collect();

        let lists = searcher.search(queries, 5).await.unwrap();
        let ids: Vec<i64> = lists.iter().map(|l| l[0].id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_lexical_tokenizes_and_applies_budget() {
        let store = Arc::new(Recording::default());
        let searcher = ParallelLexicalSearcher::new(store.clone(), Arc::new(PlainTokenizer::default()));

        let lists = searcher.search(&validated(&["Mercy, Of God!"]), 7).await.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(*store.seen.lock(), vec![("mercy of god".to_string(), 7)]);
    }

    #[tokio::test]
    async fn test_lexical_failure_names_sub_query() {
        let store = Arc::new(Recording::default());
        let searcher = ParallelLexicalSearcher::new(store, Arc::new(PlainTokenizer::default()));

        let err = searcher
            .search(&validated(&["ok", "fail", "ok too"]), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::LexicalSearch { index: 1, .. }));
        assert_eq!(err.stage(), Stage::LexicalSearch);
    }
}
