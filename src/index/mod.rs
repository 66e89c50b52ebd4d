#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Result, SupportError};

/// Distance metric used to rank search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
}

/// Payload stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub text: String,
    pub url: String,
    pub chunk_index: u32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// The persisted unit inside a collection. Uniqueness is on `id` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: IndexRecord,
    pub score: f32,
}

struct Collection {
    dimension: usize,
    distance: Distance,
    /// Records in first-insertion order; replaced records keep their slot so
    /// tie-breaking stays deterministic across re-ingestion.
    records: Vec<IndexRecord>,
    positions: HashMap<String, usize>,
}

/// In-process vector store supporting idempotent collection creation,
/// upsert-by-id, and nearest-neighbor search.
///
/// Interior locking makes concurrent upserts and searches from independent
/// sessions safe; no lock is ever held across a network call because the
/// store performs none.
#[derive(Default)]
pub struct VectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl VectorIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent collection creation. Re-creating an existing collection with
    /// the same dimension is a no-op; a differing dimension is a configuration
    /// error, never silently ignored.
    #[inline]
    pub fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        if dimension == 0 {
            return Err(SupportError::InvalidArgument(
                "collection dimension must be greater than zero".to_string(),
            ));
        }

        let mut collections = self.write_lock();

        if let Some(existing) = collections.get(name) {
            if existing.dimension != dimension {
                return Err(SupportError::ConfigMismatch(format!(
                    "collection '{}' already exists with dimension {} (requested {})",
                    name, existing.dimension, dimension
                )));
            }
            debug!("Collection '{}' already exists, nothing to do", name);
            return Ok(());
        }

        collections.insert(
            name.to_string(),
            Collection {
                dimension,
                distance,
                records: Vec::new(),
                positions: HashMap::new(),
            },
        );

        info!(
            "Created collection '{}' with dimension {} ({:?})",
            name, dimension, distance
        );
        Ok(())
    }

    /// Insert or replace records by id. Every record's vector dimension must
    /// equal the collection's declared dimension or the whole upsert fails
    /// before any record is written.
    #[inline]
    pub fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()> {
        let mut collections = self.write_lock();
        let target = collections.get_mut(collection).ok_or_else(|| {
            SupportError::ConfigMismatch(format!("collection '{}' does not exist", collection))
        })?;

        for record in &records {
            if record.vector.len() != target.dimension {
                return Err(SupportError::ConfigMismatch(format!(
                    "record '{}' has dimension {} but collection '{}' expects {}",
                    record.id,
                    record.vector.len(),
                    collection,
                    target.dimension
                )));
            }
        }

        let count = records.len();
        for record in records {
            match target.positions.get(&record.id) {
                Some(&position) => target.records[position] = record,
                None => {
                    target.positions.insert(record.id.clone(), target.records.len());
                    target.records.push(record);
                }
            }
        }

        debug!("Upserted {} records into '{}'", count, collection);
        Ok(())
    }

    /// Return up to `top_k` records ranked by descending similarity. Ties are
    /// broken by insertion order. Searching an empty collection returns an
    /// empty result, not an error.
    #[inline]
    pub fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(SupportError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }

        let collections = self.read_lock();
        let target = collections.get(collection).ok_or_else(|| {
            SupportError::ConfigMismatch(format!("collection '{}' does not exist", collection))
        })?;

        if query_vector.len() != target.dimension {
            return Err(SupportError::ConfigMismatch(format!(
                "query vector has dimension {} but collection '{}' expects {}",
                query_vector.len(),
                collection,
                target.dimension
            )));
        }

        let mut hits: Vec<SearchHit> = target
            .records
            .iter()
            .map(|record| SearchHit {
                score: score(target.distance, query_vector, &record.vector),
                record: record.clone(),
            })
            .collect();

        // Stable sort keeps insertion order within equal scores.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        debug!(
            "Search in '{}' returned {} of up to {} hits",
            collection,
            hits.len(),
            top_k
        );
        Ok(hits)
    }

    /// Number of records currently stored in a collection.
    #[inline]
    pub fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.read_lock();
        collections
            .get(collection)
            .map(|c| c.records.len())
            .ok_or_else(|| {
                SupportError::ConfigMismatch(format!("collection '{}' does not exist", collection))
            })
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Collection>> {
        self.collections
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>> {
        self.collections
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn score(distance: Distance, query: &[f32], candidate: &[f32]) -> f32 {
    match distance {
        Distance::Cosine => cosine_similarity(query, candidate),
        Distance::Dot => dot_product(query, candidate),
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = dot_product(a, a).sqrt();
    let norm_b = dot_product(b, b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
