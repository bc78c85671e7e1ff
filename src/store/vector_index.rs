//! HNSW vector store for filtered similarity search

use async_trait::async_trait;
use hnsw_rs::filter::FilterT;
use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::IndexingConfig;
use crate::retrieval::labels::{matches_facets, FacetLabel};
use crate::store::{IndexedPassage, Passage, PassageId, SemanticQuery, SemanticSearcher, StoreError};

/// hnsw_rs caps the layer count at 16.
const MAX_LAYERS: usize = 16;

struct Entry {
    passage: Passage,
    labels: Vec<FacetLabel>,
}

/// Graph and payloads behind one lock, so readers never see a vector whose
/// entry is missing and no two locks are ever nested.
struct Inner {
    index: Hnsw<'static, f32, DistCosine>,
    entries: Vec<Entry>,
    ids: HashSet<PassageId>,
}

impl Inner {
    /// Internal ids of entries matching `labels`, sorted ascending.
    fn allowed_ids(&self, labels: &[FacetLabel]) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| matches_facets(labels, &entry.labels))
            .map(|(data_id, _)| data_id)
            .collect()
    }

    fn search(&self, query: &SemanticQuery, limit: usize, ef: usize) -> Result<Vec<Passage>, StoreError> {
        if limit == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let neighbours = if query.labels.is_empty() {
            self.index.search(&query.vector, limit, ef)
        } else {
            let allowed = self.allowed_ids(&query.labels);
            debug!(candidates = allowed.len(), "Filtered vector search");
            if allowed.is_empty() {
                return Ok(Vec::new());
            }
            let filter: &dyn FilterT = &allowed;
            self.index.search_filter(&query.vector, limit, ef, Some(filter))
        };

        neighbours
            .into_iter()
            .map(|n| {
                self.entries
                    .get(n.d_id)
                    .map(|entry| entry.passage.clone())
                    .ok_or_else(|| StoreError::Search(format!("unknown vector id {}", n.d_id)))
            })
            .collect()
    }
}

/// In-memory HNSW index over passage embeddings.
///
/// Uses cosine distance. Each vector is stored under a sequential internal id
/// that indexes the entry list, which keeps the passage payload and its facet
/// labels. Searches run on the blocking pool.
pub struct VectorStore {
    inner: Arc<RwLock<Inner>>,
    dimension: usize,
    ef_search: usize,
}

impl VectorStore {
    pub fn new(config: &IndexingConfig) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            config.hnsw_m,
            config.max_elements,
            MAX_LAYERS,
            config.hnsw_ef_construction,
            DistCosine,
        );

        Self {
            inner: Arc::new(RwLock::new(Inner {
                index,
                entries: Vec::new(),
                ids: HashSet::new(),
            })),
            dimension: config.vector_dim,
            ef_search: config.hnsw_ef_search,
        }
    }

    pub fn insert(&self, item: &IndexedPassage, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut inner = self.inner.write();
        if !inner.ids.insert(item.passage.id) {
            return Err(StoreError::DuplicateId(item.passage.id));
        }

        let data_id = inner.entries.len();
        inner.entries.push(Entry {
            passage: item.passage.clone(),
            labels: item.labels(),
        });

        let data = vector.to_vec();
        inner.index.insert((&data, data_id));

        Ok(())
    }

    pub fn insert_batch(&self, items: &[(IndexedPassage, Vec<f32>)]) -> Result<(), StoreError> {
        for (item, vector) in items {
            self.insert(item, vector)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn contains(&self, id: PassageId) -> bool {
        self.inner.read().ids.contains(&id)
    }

    fn check_dimension(&self, query: &SemanticQuery) -> Result<(), StoreError> {
        if query.vector.len() != self.dimension {
            return Err(StoreError::InvalidDimension {
                expected: self.dimension,
                actual: query.vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SemanticSearcher for VectorStore {
    async fn semantic_search(
        &self,
        query: &SemanticQuery,
        limit: usize,
    ) -> Result<Vec<Passage>, StoreError> {
        self.check_dimension(query)?;

        let inner = Arc::clone(&self.inner);
        let query = query.clone();
        let ef = self.ef_search.max(limit);
        tokio::task::spawn_blocking(move || inner.read().search(&query, limit, ef))
            .await
            .map_err(|e| StoreError::Search(format!("vector search task failed: {e}")))?
    }
}
