//! Knowledge layer: artifacts, the vector store, embedding, compilation,
//! and retrieval coordination.
//!
//! An [`Artifact`] is one unit of retrieved/compiled knowledge: a scored,
//! embedded summary of a fetched page. Artifacts are created by the
//! [`compiler::KnowledgeCompiler`], mutated only by feedback appends, and
//! never deleted inside this core (eviction is an outer-layer concern).

pub mod compiler;
pub mod embedding;
pub mod retrieval;
pub mod vector_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an artifact came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPattern {
    /// Produced from a search-style candidate URL.
    WebSearchV1,
    /// Produced by scraping a directly specified URL.
    WebScrapeV1,
    /// Compilation failed twice; placeholder with provenance 0 and no embedding.
    Fallback,
    /// A single candidate failed inside a retrieval batch.
    Error,
}

impl RetrievalPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalPattern::WebSearchV1 => "web_search_v1",
            RetrievalPattern::WebScrapeV1 => "web_scrape_v1",
            RetrievalPattern::Fallback => "fallback",
            RetrievalPattern::Error => "error",
        }
    }
}

/// One append-only feedback entry on an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Caller-assigned quality score, conventionally in [0,1].
    pub score: f32,
    #[serde(default)]
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

/// A scored, embedded unit of retrieved/compiled knowledge.
///
/// Invariant: artifacts whose pattern is neither `Fallback` nor `Error`
/// carry an embedding of the vector store's configured dimension before
/// insertion; the store rejects anything else with `DimensionMismatch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub title: String,
    /// Extractive summary, at most the configured maximum length.
    pub summary: String,
    pub source_url: String,
    /// FNV-1a 64 digest of the extracted text; `None` for fallback artifacts.
    pub content_hash: Option<String>,
    /// Empty for fallback/error artifacts.
    pub embedding: Vec<f32>,
    /// Heuristic trust estimate for the source, in [0,1].
    pub provenance_score: f32,
    pub pattern: RetrievalPattern,
    pub created_at: DateTime<Utc>,
    /// Free-form metadata: domain, query used, fetch timestamp.
    pub metadata: serde_json::Value,
    /// Append-only; mean of scores feeds the composite ranking.
    pub feedback: Vec<FeedbackEntry>,
}

impl Artifact {
    /// Mean feedback score, or 0.0 when no feedback has been recorded.
    pub fn feedback_mean(&self) -> f32 {
        if self.feedback.is_empty() {
            return 0.0;
        }
        self.feedback.iter().map(|f| f.score).sum::<f32>() / self.feedback.len() as f32
    }

    /// Age-based freshness: `1 / (1 + age_in_days)`.
    pub fn recency(&self, now: DateTime<Utc>) -> f32 {
        let age_days = (now - self.created_at).num_seconds().max(0) as f32 / 86_400.0;
        1.0 / (1.0 + age_days)
    }
}

/// FNV-1a 64-bit digest, hex-encoded. Cheap content fingerprint for
/// deduplication and change detection on extracted page text.
pub(crate) fn fnv1a_hex(text: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in text.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_mean_empty_is_zero() {
        let artifact = Artifact {
            id: "a".into(),
            title: String::new(),
            summary: String::new(),
            source_url: String::new(),
            content_hash: None,
            embedding: Vec::new(),
            provenance_score: 0.0,
            pattern: RetrievalPattern::Fallback,
            created_at: Utc::now(),
            metadata: serde_json::json!({}),
            feedback: Vec::new(),
        };
        assert_eq!(artifact.feedback_mean(), 0.0);
    }

    #[test]
    fn test_recency_decays_with_age() {
        let now = Utc::now();
        let fresh = Artifact {
            id: "f".into(),
            title: String::new(),
            summary: String::new(),
            source_url: String::new(),
            content_hash: None,
            embedding: Vec::new(),
            provenance_score: 0.0,
            pattern: RetrievalPattern::WebScrapeV1,
            created_at: now,
            metadata: serde_json::json!({}),
            feedback: Vec::new(),
        };
        let mut stale = fresh.clone();
        stale.created_at = now - chrono::Duration::days(3);
        assert!(fresh.recency(now) > stale.recency(now));
        assert!((stale.recency(now) - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_pattern_serde_tags() {
        let tag = serde_json::to_string(&RetrievalPattern::WebSearchV1).unwrap();
        assert_eq!(tag, "\"web_search_v1\"");
        assert_eq!(RetrievalPattern::Fallback.as_str(), "fallback");
    }

    #[test]
    fn test_fnv1a_is_stable() {
        assert_eq!(fnv1a_hex("dyad"), fnv1a_hex("dyad"));
        assert_ne!(fnv1a_hex("dyad"), fnv1a_hex("dyads"));
        assert_eq!(fnv1a_hex("").len(), 16);
    }
}
