#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunking::chunk_text;
use crate::embeddings::TextEmbedder;
use crate::index::{Distance, IndexRecord, RecordPayload, VectorIndex};
use crate::{Capability, Result, SupportError};

/// A source document at ingest time. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub description: String,
    pub language: String,
    pub crawl_date: String,
}

impl Document {
    #[inline]
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            metadata: DocumentMetadata {
                title: String::new(),
                description: String::new(),
                language: "en".to_string(),
                crawl_date: Utc::now().to_rfc3339(),
            },
        }
    }

    #[inline]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = title.into();
        self
    }
}

/// What ingesting one document produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks_total: usize,
    pub chunks_indexed: usize,
}

/// One retrieved chunk with its source and similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub url: String,
    pub score: f32,
}

/// Ranked retrieval context for one question. Consumed by the composer and
/// discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
    /// Source urls deduplicated in first-seen order.
    pub sources: Vec<String>,
}

/// Outcome of a retrieval pass. Finding nothing is a distinct condition, not
/// an error and not an empty success, so the composer can short-circuit to
/// its fallback instead of generating from thin air.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    Hits(RetrievalResult),
    NoRelevantContent,
}

/// Orchestrates chunk embedding and storage at ingest time and similarity
/// search at query time.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn TextEmbedder>,
    collection: String,
    distance: Distance,
    dimension: OnceLock<usize>,
}

impl Retriever {
    #[inline]
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn TextEmbedder>,
        collection: impl Into<String>,
        distance: Distance,
    ) -> Self {
        Self {
            index,
            embedder,
            collection: collection.into(),
            distance,
            dimension: OnceLock::new(),
        }
    }

    /// Chunk, embed, and upsert one document. Chunks that are empty after
    /// trimming are skipped. All chunks are embedded in one batch before any
    /// upsert, so an embedding failure leaves no partial records behind.
    /// Record ids are derived from `(url, chunk_index)`, so re-ingesting an
    /// unchanged document upserts in place instead of duplicating.
    #[inline]
    pub fn ingest(&self, document: &Document, chunk_size: usize) -> Result<IngestReport> {
        let chunks = chunk_text(&document.text, chunk_size)?;
        let chunks_total = chunks.len();

        let survivors: Vec<(usize, String)> = chunks
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();

        if survivors.is_empty() {
            debug!("Document {} produced no indexable chunks", document.url);
            return Ok(IngestReport {
                chunks_total,
                chunks_indexed: 0,
            });
        }

        self.ensure_ready()?;

        let texts: Vec<String> = survivors.iter().map(|(_, text)| text.clone()).collect();
        let vectors = self.embedder.embed(&texts)?;

        if vectors.len() != texts.len() {
            return Err(SupportError::ExternalService {
                capability: Capability::Embedding,
                message: format!(
                    "embedded {} of {} chunks",
                    vectors.len(),
                    texts.len()
                ),
            });
        }

        let metadata = metadata_map(&document.metadata);
        let records: Vec<IndexRecord> = survivors
            .into_iter()
            .zip(vectors)
            .map(|((sequence_index, text), vector)| IndexRecord {
                id: chunk_record_id(&document.url, sequence_index),
                vector,
                payload: RecordPayload {
                    text,
                    url: document.url.clone(),
                    chunk_index: sequence_index as u32,
                    metadata: metadata.clone(),
                },
            })
            .collect();

        let chunks_indexed = records.len();
        self.index.upsert(&self.collection, records)?;

        info!(
            "Ingested {} ({} of {} chunks indexed)",
            document.url, chunks_indexed, chunks_total
        );

        Ok(IngestReport {
            chunks_total,
            chunks_indexed,
        })
    }

    /// Embed the question, search the index, and return the ranked chunks
    /// with deduplicated sources.
    #[inline]
    pub fn answer_context(&self, question: &str, top_k: usize) -> Result<RetrievalOutcome> {
        if top_k == 0 {
            return Err(SupportError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }

        self.ensure_ready()?;

        let mut vectors = self.embedder.embed(&[question.to_string()])?;
        let query_vector = vectors.pop().ok_or_else(|| SupportError::ExternalService {
            capability: Capability::Embedding,
            message: "question embedding returned no vector".to_string(),
        })?;

        let hits = self.index.search(&self.collection, &query_vector, top_k)?;

        if hits.is_empty() {
            debug!("No relevant content for question");
            return Ok(RetrievalOutcome::NoRelevantContent);
        }

        let mut sources = Vec::new();
        let mut chunks = Vec::with_capacity(hits.len());
        for hit in hits {
            if !sources.contains(&hit.record.payload.url) {
                sources.push(hit.record.payload.url.clone());
            }
            chunks.push(RetrievedChunk {
                text: hit.record.payload.text,
                url: hit.record.payload.url,
                score: hit.score,
            });
        }

        Ok(RetrievalOutcome::Hits(RetrievalResult { chunks, sources }))
    }

    /// Discover the embedding dimension once and size the collection with it.
    fn ensure_ready(&self) -> Result<()> {
        if let Some(&dimension) = self.dimension.get() {
            return self
                .index
                .ensure_collection(&self.collection, dimension, self.distance);
        }

        let dimension = self.embedder.probe_dimension()?;
        self.index
            .ensure_collection(&self.collection, dimension, self.distance)?;
        let _ = self.dimension.set(dimension);

        debug!(
            "Collection '{}' ready with dimension {}",
            self.collection, dimension
        );
        Ok(())
    }
}

fn chunk_record_id(url: &str, sequence_index: usize) -> String {
    // Content-addressed id: re-ingesting the same document upserts in place.
    let name = format!("{url}#{sequence_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

fn metadata_map(metadata: &DocumentMetadata) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if !metadata.title.is_empty() {
        map.insert("title".to_string(), metadata.title.clone());
    }
    if !metadata.description.is_empty() {
        map.insert("description".to_string(), metadata.description.clone());
    }
    if !metadata.language.is_empty() {
        map.insert("language".to_string(), metadata.language.clone());
    }
    if !metadata.crawl_date.is_empty() {
        map.insert("crawl_date".to_string(), metadata.crawl_date.clone());
    }
    map
}
