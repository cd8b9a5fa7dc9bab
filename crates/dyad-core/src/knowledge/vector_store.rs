//! Exact nearest-neighbor search over embedding vectors.
//!
//! Brute-force cosine scan: O(n·d) per query, chosen deliberately for
//! correctness and testability at this core's intended corpus size
//! (hundreds to low thousands of artifacts). Zero-norm vectors score 0;
//! there is never a division by zero. Duplicate ids are last-write-wins:
//! the entry is replaced in place, keeping its original insertion position
//! for tie-breaking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// One search hit: id, cosine score, and the metadata stored at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

struct Entry {
    id: String,
    vector: Vec<f32>,
    metadata: serde_json::Value,
    inserted_at: DateTime<Utc>,
}

/// Exact linear-scan vector index with attached metadata.
pub struct VectorStore {
    dimension: usize,
    entries: Vec<Entry>,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a vector with metadata. Fails fast with `DimensionMismatch`
    /// on a wrong-length vector; an existing id is overwritten in place.
    pub fn add(
        &mut self,
        id: impl Into<String>,
        vector: Vec<f32>,
        metadata: serde_json::Value,
    ) -> CoreResult<()> {
        if vector.len() != self.dimension {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        let id = id.into();
        let now = Utc::now();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == id) {
            existing.vector = vector;
            existing.metadata = metadata;
            existing.inserted_at = now;
            return Ok(());
        }
        self.entries.push(Entry {
            id,
            vector,
            metadata,
            inserted_at: now,
        });
        Ok(())
    }

    /// Top-`k` entries by descending cosine similarity, ties broken by
    /// insertion order. `k` larger than the store returns everything.
    pub fn search(&self, query: &[f32], k: usize) -> CoreResult<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (idx, cosine_similarity(query, &e.vector)))
            .collect();
        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(idx, score)| SearchHit {
                id: self.entries[idx].id.clone(),
                score,
                metadata: self.entries[idx].metadata.clone(),
            })
            .collect())
    }

    /// Insertion timestamp for an id, if present.
    pub fn inserted_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.inserted_at)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for i in 0..a.len() {
        let x = a[i];
        let y = b[i];
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store3() -> VectorStore {
        VectorStore::new(3)
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut store = store3();
        let err = store
            .add("a", vec![1.0, 0.0], serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::DimensionMismatch { expected: 3, got: 2 }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_dimension() {
        let store = store3();
        let err = store.search(&[1.0, 0.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, CoreError::DimensionMismatch { got: 4, .. }));
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut store = store3();
        store.add("x", vec![1.0, 0.0, 0.0], serde_json::json!({"n": 1})).unwrap();
        store.add("y", vec![0.0, 1.0, 0.0], serde_json::json!({"n": 2})).unwrap();
        store.add("z", vec![0.9, 0.1, 0.0], serde_json::json!({"n": 3})).unwrap();
        let hits = store.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "x");
        assert_eq!(hits[1].id, "z");
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let mut store = store3();
        store.add("first", vec![1.0, 0.0, 0.0], serde_json::json!({})).unwrap();
        store.add("second", vec![2.0, 0.0, 0.0], serde_json::json!({})).unwrap();
        // Both have cosine 1.0 against the query.
        let hits = store.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[1].id, "second");
    }

    #[test]
    fn test_zero_norm_scores_zero() {
        let mut store = store3();
        store.add("zero", vec![0.0, 0.0, 0.0], serde_json::json!({})).unwrap();
        let hits = store.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn test_oversized_k_returns_all() {
        let mut store = store3();
        store.add("a", vec![1.0, 0.0, 0.0], serde_json::json!({})).unwrap();
        store.add("b", vec![0.0, 1.0, 0.0], serde_json::json!({})).unwrap();
        let hits = store.search(&[1.0, 1.0, 0.0], 50).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_duplicate_id_last_write_wins() {
        let mut store = store3();
        store.add("dup", vec![1.0, 0.0, 0.0], serde_json::json!({"v": 1})).unwrap();
        store.add("other", vec![0.0, 0.0, 1.0], serde_json::json!({})).unwrap();
        store.add("dup", vec![0.0, 1.0, 0.0], serde_json::json!({"v": 2})).unwrap();
        assert_eq!(store.len(), 2);
        let hits = store.search(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].id, "dup");
        assert_eq!(hits[0].metadata["v"], 2);
        // Replacement keeps the original insertion slot.
        let all = store.search(&[0.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(all[0].id, "dup");
    }
}
