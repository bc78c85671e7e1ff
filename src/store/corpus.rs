//! JSONL passage corpus and bulk indexing into both stores.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info};

use crate::embedding::{Embedder, EmbeddingError};
use crate::error::{Result, ShaikhError};
use crate::metadata::ChunkMetadata;
use crate::retrieval::filters::{ContentType, Source};
use crate::retrieval::labels::ayah_count;
use crate::store::{IndexedPassage, KeywordIndex, Passage, PassageId, StoreError, VectorStore};
use crate::text::Tokenizer;

/// One line of a corpus file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub id: PassageId,
    pub content: String,
    #[serde(default)]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub surah: Option<u16>,
    #[serde(default)]
    pub ayah: Option<u16>,
    /// Precomputed embedding; computed at index time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Pre-normalized text; derived from `content` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenized: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChunkMetadata>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub passages: usize,
    /// Embeddings computed during indexing
    pub embedded: usize,
}

/// Passages loaded from JSONL, resolved against their metadata.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<CorpusRecord>,
}

impl Corpus {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| ShaikhError::Io {
            source: e,
            context: format!("Failed to open corpus: {}", path.display()),
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut records = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line_no = i + 1;
            let line = line.map_err(|e| ShaikhError::Io {
                source: e,
                context: format!("Failed to read corpus line {line_no}"),
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let record: CorpusRecord =
                serde_json::from_str(&line).map_err(|e| ShaikhError::Corpus {
                    line: line_no,
                    message: e.to_string(),
                })?;
            records.push(resolve(record, line_no)?);
        }

        debug!(records = records.len(), "Loaded corpus");
        Ok(Self { records })
    }

    pub fn records(&self) -> &[CorpusRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embeds records lacking a vector in `batch_size` batches, then inserts
    /// every record into both stores and commits the keyword index.
    ///
    /// Dimensions and ids are checked for the whole corpus before either store
    /// is written. Keyword documents are committed before any vector is
    /// inserted and rolled back if staging or the commit fails, so an error
    /// leaves both stores as they were.
    pub fn index_into(
        &self,
        embedder: &dyn Embedder,
        tokenizer: &dyn Tokenizer,
        vectors: &VectorStore,
        keywords: &KeywordIndex,
        batch_size: usize,
    ) -> Result<IndexStats> {
        let (prepared, embedded) = self.prepare(embedder, tokenizer, vectors, batch_size)?;

        let staged = prepared
            .iter()
            .try_for_each(|(item, _, tokenized)| keywords.insert(item, tokenized))
            .and_then(|()| keywords.commit());
        if let Err(e) = staged {
            keywords.rollback()?;
            return Err(e.into());
        }

        for (item, vector, _) in &prepared {
            vectors.insert(item, vector)?;
        }

        let stats = IndexStats {
            passages: prepared.len(),
            embedded,
        };
        info!(
            passages = stats.passages,
            embedded = stats.embedded,
            "Indexed corpus"
        );
        Ok(stats)
    }

    /// Embeds, tokenizes and checks every record without touching the stores.
    fn prepare(
        &self,
        embedder: &dyn Embedder,
        tokenizer: &dyn Tokenizer,
        vectors: &VectorStore,
        batch_size: usize,
    ) -> Result<(Vec<Prepared>, usize)> {
        let mut prepared = Vec::with_capacity(self.records.len());
        let mut seen = HashSet::with_capacity(self.records.len());
        let mut embedded = 0;

        for batch in self.records.chunks(batch_size.max(1)) {
            let missing: Vec<String> = batch
                .iter()
                .filter(|r| r.embedding.is_none())
                .map(|r| r.content.clone())
                .collect();
            let computed = if missing.is_empty() {
                Vec::new()
            } else {
                embedder.embed_batch(&missing)?
            };
            let mismatch = EmbeddingError::CountMismatch {
                expected: missing.len(),
                actual: computed.len(),
            };
            if computed.len() != missing.len() {
                return Err(mismatch.into());
            }
            let mut computed = computed.into_iter();
            embedded += missing.len();

            for record in batch {
                let vector = match &record.embedding {
                    Some(v) => v.clone(),
                    None => computed.next().ok_or_else(|| mismatch.clone())?,
                };
                if vector.len() != vectors.dimension() {
                    return Err(StoreError::InvalidDimension {
                        expected: vectors.dimension(),
                        actual: vector.len(),
                    }
                    .into());
                }
                if !seen.insert(record.id) || vectors.contains(record.id) {
                    return Err(StoreError::DuplicateId(record.id).into());
                }

                let tokenized = record
                    .tokenized
                    .clone()
                    .unwrap_or_else(|| tokenizer.tokenize(&record.content));
                prepared.push((record.indexed(), vector, tokenized));
            }
            debug!(prepared = prepared.len(), "Prepared corpus batch");
        }

        Ok((prepared, embedded))
    }
}

/// A record ready for both stores: payload, vector, tokenized text.
type Prepared = (IndexedPassage, Vec<f32>, String);

impl CorpusRecord {
    pub fn indexed(&self) -> IndexedPassage {
        IndexedPassage {
            passage: Passage {
                id: self.id,
                content: self.content.clone(),
                source: self.source.map(|s| s.to_string()).unwrap_or_default(),
                surah: self.surah,
                ayah: self.ayah,
            },
            content_type: self.content_type,
            source: self.source,
        }
    }
}

/// Fills surah/ayah from metadata and checks the position is consistent.
fn resolve(mut record: CorpusRecord, line: usize) -> Result<CorpusRecord> {
    let err = |message: String| ShaikhError::Corpus { line, message };

    if let Some(meta) = &record.metadata {
        record.surah = merge("surah", record.surah, meta.surah()).map_err(err)?;
        record.ayah = merge("ayah", record.ayah, meta.ayah()).map_err(err)?;
    }

    if let Some(surah) = record.surah {
        let max = ayah_count(surah).ok_or_else(|| err(format!("surah {surah} does not exist")))?;
        if let Some(ayah) = record.ayah {
            if ayah == 0 || ayah > max {
                return Err(err(format!("surah {surah} has no ayah {ayah}")));
            }
        }
    } else if record.ayah.is_some() {
        return Err(err("ayah given without a surah".to_string()));
    }

    Ok(record)
}

fn merge(
    field: &str,
    explicit: Option<u16>,
    from_meta: Option<u16>,
) -> std::result::Result<Option<u16>, String> {
    match (explicit, from_meta) {
        (Some(a), Some(b)) if a != b => Err(format!(
            "{field} {a} contradicts metadata {field} {b}"
        )),
        (a, b) => Ok(a.or(b)),
    }
}
