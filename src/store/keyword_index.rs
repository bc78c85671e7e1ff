//! Tantivy keyword index for filtered full-text search
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument};
use tracing::debug;

use crate::retrieval::labels::FacetLabel;
use crate::store::{IndexedPassage, LexicalFilters, LexicalQuery, LexicalSearcher, Passage, StoreError};

const WRITER_BUDGET: usize = 50_000_000;

#[derive(Clone, Copy)]
struct Fields {
    id: Field,
    text: Field,
    content: Field,
    source_name: Field,
    content_type: Field,
    source: Field,
    surah: Field,
    ayah: Field,
}

impl Fields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let fields = Self {
            id: builder.add_i64_field("id", INDEXED | STORED),
            text: builder.add_text_field("text", TEXT),
            content: builder.add_text_field("content", STORED),
            source_name: builder.add_text_field("source_name", STORED),
            content_type: builder.add_u64_field("content_type", INDEXED),
            source: builder.add_u64_field("source", INDEXED),
            surah: builder.add_u64_field("surah", INDEXED | STORED),
            ayah: builder.add_u64_field("ayah", INDEXED | STORED),
        };
        (builder.build(), fields)
    }

    fn from_schema(schema: &Schema) -> Result<Self, StoreError> {
        let get = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| StoreError::Index(format!("Missing '{name}' field in schema")))
        };
        Ok(Self {
            id: get("id")?,
            text: get("text")?,
            content: get("content")?,
            source_name: get("source_name")?,
            content_type: get("content_type")?,
            source: get("source")?,
            surah: get("surah")?,
            ayah: get("ayah")?,
        })
    }
}

/// Tantivy keyword index wrapper
///
/// BM25 over the normalized `text` field; the display payload is stored
/// alongside and facets are indexed as u64 terms.
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

impl KeywordIndex {
    /// Open the index in `path`, creating it when absent.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if path.join("meta.json").exists() {
            let index = Index::open_in_dir(path)
                .map_err(|e| StoreError::Index(e.to_string()))?;
            let fields = Fields::from_schema(&index.schema())?;
            Self::with_index(index, fields)
        } else {
            std::fs::create_dir_all(path)?;
            let (schema, fields) = Fields::schema();
            let index = Index::create_in_dir(path, schema)
                .map_err(|e| StoreError::Index(e.to_string()))?;
            Self::with_index(index, fields)
        }
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let (schema, fields) = Fields::schema();
        Self::with_index(Index::create_in_ram(schema), fields)
    }

    fn with_index(index: Index, fields: Fields) -> Result<Self, StoreError> {
        let writer = index
            .writer(WRITER_BUDGET)
            .map_err(|e| StoreError::Index(e.to_string()))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| StoreError::Index(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    /// Stage a passage; `tokenized` is its normalized text.
    pub fn insert(&self, item: &IndexedPassage, tokenized: &str) -> Result<(), StoreError> {
        let f = self.fields;
        let passage = &item.passage;

        let mut doc = TantivyDocument::default();
        doc.add_i64(f.id, passage.id);
        doc.add_text(f.text, tokenized);
        doc.add_text(f.content, &passage.content);
        doc.add_text(f.source_name, &passage.source);
        if let Some(ct) = item.content_type {
            doc.add_u64(f.content_type, FacetLabel::for_content_type(ct).value() as u64);
        }
        if let Some(src) = item.source {
            doc.add_u64(f.source, FacetLabel::for_source(src).value() as u64);
        }
        if let Some(surah) = passage.surah {
            doc.add_u64(f.surah, surah as u64);
        }
        if let Some(ayah) = passage.ayah {
            doc.add_u64(f.ayah, ayah as u64);
        }

        self.writer
            .lock()
            .add_document(doc)
            .map_err(|e| StoreError::Index(e.to_string()))?;
        Ok(())
    }

    /// Commit staged documents and make them searchable.
    pub fn commit(&self) -> Result<(), StoreError> {
        self.writer.lock().commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Drop documents staged since the last commit.
    pub fn rollback(&self) -> Result<(), StoreError> {
        self.writer.lock().rollback()?;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn term(field: Field, value: u64) -> Box<dyn Query> {
        Box::new(TermQuery::new(
            Term::from_field_u64(field, value),
            IndexRecordOption::Basic,
        ))
    }

    /// Any of `values` on `field`.
    fn any_of(field: Field, values: impl Iterator<Item = u64>) -> Box<dyn Query> {
        let clauses = values.map(|v| (Occur::Should, Self::term(field, v))).collect();
        Box::new(BooleanQuery::new(clauses))
    }

    fn filter_clauses(&self, filters: &LexicalFilters) -> Vec<Box<dyn Query>> {
        let f = self.fields;
        let mut clauses = Vec::new();

        if let Some(ct) = filters.content_type {
            clauses.push(Self::term(f.content_type, FacetLabel::for_content_type(ct).value() as u64));
        }
        if let Some(src) = filters.source {
            clauses.push(Self::term(f.source, FacetLabel::for_source(src).value() as u64));
        }
        if let (Some(start), Some(end)) = (filters.surah_start, filters.surah_end) {
            clauses.push(Self::any_of(f.surah, (start..=end).map(u64::from)));
        }
        if let Some(surah) = filters.surah {
            clauses.push(Self::term(f.surah, surah as u64));
        }
        if let (Some(start), Some(end)) = (filters.ayah_start, filters.ayah_end) {
            clauses.push(Self::any_of(f.ayah, (start..=end).map(u64::from)));
        }

        clauses
    }

    /// Lenient full-text query ANDed with the structured filters.
    fn build_query(&self, query: &LexicalQuery) -> BooleanQuery {
        let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let (text_query, parse_errors) = parser.parse_query_lenient(&query.text);
        if !parse_errors.is_empty() {
            debug!(errors = parse_errors.len(), "Lenient query parse dropped terms");
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, text_query)];
        let filters = self.filter_clauses(&query.filters);
        if !filters.is_empty() {
            let filter = BooleanQuery::new(filters.into_iter().map(|q| (Occur::Must, q)).collect());
            clauses.push((Occur::Must, Box::new(ConstScoreQuery::new(Box::new(filter), 0.0))));
        }
        BooleanQuery::new(clauses)
    }
}

impl Fields {
    fn top_passages(
        self,
        searcher: &Searcher,
        query: &BooleanQuery,
        limit: usize,
    ) -> Result<Vec<Passage>, StoreError> {
        let top_docs = searcher
            .search(query, &TopDocs::with_limit(limit))
            .map_err(|e| StoreError::Search(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| StoreError::Search(e.to_string()))?;
            results.push(self.passage(&doc)?);
        }
        Ok(results)
    }

    fn passage(self, doc: &TantivyDocument) -> Result<Passage, StoreError> {
        let id = doc
            .get_first(self.id)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| StoreError::Search("Missing or invalid ID field".to_string()))?;
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let number = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_u64())
                .and_then(|v| u16::try_from(v).ok())
        };

        Ok(Passage {
            id,
            content: text(self.content),
            source: text(self.source_name),
            surah: number(self.surah),
            ayah: number(self.ayah),
        })
    }
}

#[async_trait]
impl LexicalSearcher for KeywordIndex {
    async fn lexical_search(
        &self,
        query: &LexicalQuery,
        limit: usize,
    ) -> Result<Vec<Passage>, StoreError> {
        if limit == 0 || query.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let combined = self.build_query(query);
        let searcher = self.reader.searcher();
        let fields = self.fields;
        tokio::task::spawn_blocking(move || fields.top_passages(&searcher, &combined, limit))
            .await
            .map_err(|e| StoreError::Search(format!("keyword search task failed: {e}")))?
    }
}
