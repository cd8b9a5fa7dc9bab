//! Retrieval coordination: candidate discovery, batch compilation, vector
//! search, composite ranking, multi-hop chaining, and feedback.
//!
//! One retrieval run fans out over curated candidate URLs, compiles each
//! independently (a single bad URL degrades to an error-tagged artifact and
//! never aborts the batch), searches the vector store with the expanded
//! query, and merges both sets under a weighted multi-signal score. The
//! final list is capped at [`RESULT_CAP`] regardless of the requested size.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::compiler::{CompileOptions, KnowledgeCompiler};
use super::embedding::Embedder;
use super::vector_store::VectorStore;
use super::{Artifact, RetrievalPattern};
use crate::error::{CoreError, CoreResult};
use crate::traits::MemorySnippet;

/// Fixed output cap of a retrieval run, independent of `top_k`/`max_sources`.
pub const RESULT_CAP: usize = 5;

/// Curated topic → candidate-URL table. First matching topic wins; the
/// generic list covers everything else. Multi-word topics are listed before
/// their substrings ("machine learning" before "ai").
static TOPIC_SOURCES: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            "quantum",
            vec![
                "https://en.wikipedia.org/wiki/Quantum_computing",
                "https://plato.stanford.edu/entries/qt-quantcomp/",
                "https://arxiv.org/list/quant-ph/recent",
            ],
        ),
        (
            "biology",
            vec![
                "https://en.wikipedia.org/wiki/Biology",
                "https://www.nature.com/subjects/biological-sciences",
                "https://www.ncbi.nlm.nih.gov/books/",
            ],
        ),
        (
            "machine learning",
            vec![
                "https://en.wikipedia.org/wiki/Machine_learning",
                "https://arxiv.org/list/cs.LG/recent",
                "https://www.deeplearningbook.org/",
            ],
        ),
        (
            "neural",
            vec![
                "https://en.wikipedia.org/wiki/Artificial_neural_network",
                "https://arxiv.org/list/cs.NE/recent",
            ],
        ),
        (
            "ai",
            vec![
                "https://en.wikipedia.org/wiki/Artificial_intelligence",
                "https://plato.stanford.edu/entries/artificial-intelligence/",
                "https://arxiv.org/list/cs.AI/recent",
            ],
        ),
    ]
});

/// Fallback candidates when no topic matches.
static GENERIC_SOURCES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "https://en.wikipedia.org/wiki/Main_Page",
        "https://www.britannica.com/",
        "https://plato.stanford.edu/",
    ]
});

/// Options for a retrieval run.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Nearest-neighbor count requested from the vector store.
    pub top_k: usize,
    /// Maximum candidate URLs compiled per run.
    pub max_sources: usize,
    /// Memory snippets concatenated onto the query before retrieval.
    pub memory_context: Vec<MemorySnippet>,
    /// Caller-preferred URLs, prepended to (and deduplicated against) the
    /// curated candidates.
    pub preferences: Vec<String>,
    /// Multi-hop only: chain each hop's query with the previous top result.
    pub use_context: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_sources: 3,
            memory_context: Vec::new(),
            preferences: Vec::new(),
            use_context: false,
        }
    }
}

/// One ranked retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedArtifact {
    pub artifact: Artifact,
    /// Composite score: similarity/provenance/recency/feedback blend.
    pub score: f32,
}

/// Drives multi-source retrieval against the compiler and vector store.
pub struct RetrievalCoordinator {
    compiler: Arc<KnowledgeCompiler>,
    embedder: Arc<dyn Embedder>,
    store: Arc<Mutex<VectorStore>>,
}

impl RetrievalCoordinator {
    pub fn new(
        compiler: Arc<KnowledgeCompiler>,
        embedder: Arc<dyn Embedder>,
        store: Arc<Mutex<VectorStore>>,
    ) -> Self {
        Self {
            compiler,
            embedder,
            store,
        }
    }

    pub fn compiler(&self) -> &Arc<KnowledgeCompiler> {
        &self.compiler
    }

    /// Runs one retrieval pass: candidates → compile → vector search →
    /// composite ranking. Returns at most [`RESULT_CAP`] results and never
    /// fails on per-URL compilation problems.
    pub async fn run_retrieval(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> CoreResult<Vec<RankedArtifact>> {
        let expanded = expand_query(query, &options.memory_context);
        let candidates =
            generate_candidate_urls(&expanded, options.max_sources, &options.preferences);
        debug!(
            target: "dyad::retrieval",
            query,
            candidates = candidates.len(),
            "retrieval pass started"
        );

        // Compile every candidate independently; failures degrade in place.
        let mut fresh: Vec<Artifact> = Vec::with_capacity(candidates.len());
        for url in &candidates {
            let opts = CompileOptions {
                pattern: RetrievalPattern::WebSearchV1,
                query: Some(expanded.clone()),
            };
            match self.compiler.compile_from_url(url, &opts).await {
                Ok(mut artifact) => {
                    if artifact.pattern == RetrievalPattern::Fallback {
                        // Inside a batch a failed candidate is error-tagged.
                        artifact.pattern = RetrievalPattern::Error;
                        self.compiler.retag(&artifact.id, RetrievalPattern::Error);
                    }
                    fresh.push(artifact);
                }
                Err(e) => {
                    warn!(
                        target: "dyad::retrieval",
                        url,
                        error = %e,
                        "candidate compilation errored, continuing batch"
                    );
                }
            }
        }

        // Vector search over the existing corpus with the expanded query.
        let hits = match self.embedder.embed_text(&expanded).await {
            Ok(query_vec) => {
                let store = self
                    .store
                    .lock()
                    .map_err(|_| CoreError::Embedding("vector store lock poisoned".into()))?;
                store.search(&query_vec, options.top_k)?
            }
            Err(e) => {
                warn!(
                    target: "dyad::retrieval",
                    error = %e,
                    "query embedding failed, skipping vector search"
                );
                Vec::new()
            }
        };

        // Merge keyed by artifact id; later insertion wins on collision.
        let now = Utc::now();
        let mut merged: HashMap<String, RankedArtifact> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for hit in hits {
            let Some(artifact) = self.compiler.artifact(&hit.id) else {
                continue;
            };
            let score = 0.5 * hit.score
                + 0.2 * artifact.provenance_score
                + 0.2 * artifact.recency(now)
                + 0.1 * artifact.feedback_mean();
            if merged
                .insert(hit.id.clone(), RankedArtifact { artifact, score })
                .is_none()
            {
                order.push(hit.id);
            }
        }
        for artifact in fresh {
            let score = 0.2
                + 0.3 * artifact.provenance_score
                + 0.3 * artifact.recency(now)
                + 0.2 * artifact.feedback_mean();
            let id = artifact.id.clone();
            if merged
                .insert(id.clone(), RankedArtifact { artifact, score })
                .is_none()
            {
                order.push(id);
            }
        }

        let mut ranked: Vec<RankedArtifact> = order
            .into_iter()
            .filter_map(|id| merged.remove(&id))
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(RESULT_CAP);
        info!(
            target: "dyad::retrieval",
            query,
            results = ranked.len(),
            "retrieval pass complete"
        );
        Ok(ranked)
    }

    /// Sequential multi-hop retrieval: one result list per query. With
    /// `use_context`, each later hop is suffixed with a parenthetical taken
    /// from the previous hop's top result (summary, falling back to title).
    pub async fn run_multi_hop(
        &self,
        queries: &[String],
        options: &RetrievalOptions,
    ) -> CoreResult<Vec<Vec<RankedArtifact>>> {
        if queries.is_empty() {
            return Err(CoreError::EmptyQuerySet);
        }
        let mut hops: Vec<Vec<RankedArtifact>> = Vec::with_capacity(queries.len());
        let mut carry: Option<String> = None;
        for query in queries {
            let effective = match (&carry, options.use_context) {
                (Some(context), true) => format!("{query} (context: {context})"),
                _ => query.clone(),
            };
            let results = self.run_retrieval(&effective, options).await?;
            carry = results.first().map(|top| {
                let snippet = if top.artifact.summary.is_empty() {
                    top.artifact.title.clone()
                } else {
                    top.artifact.summary.clone()
                };
                snippet.chars().take(120).collect()
            });
            hops.push(results);
        }
        Ok(hops)
    }

    /// Proxies feedback to the compiler's artifact registry.
    pub fn add_artifact_feedback(&self, artifact_id: &str, score: f32, comment: &str) -> bool {
        self.compiler.add_feedback(artifact_id, score, comment)
    }
}

fn expand_query(query: &str, memory_context: &[MemorySnippet]) -> String {
    let mut expanded = query.to_string();
    for snippet in memory_context {
        let part = if snippet.text.is_empty() {
            snippet.summary.as_str()
        } else {
            snippet.text.as_str()
        };
        if !part.is_empty() {
            expanded.push(' ');
            expanded.push_str(part);
        }
    }
    expanded
}

/// Classifies the query against the curated topic table and builds the
/// candidate list: preference URLs first (deduplicated), then curated ones,
/// truncated to `max_sources`.
pub(crate) fn generate_candidate_urls(
    query: &str,
    max_sources: usize,
    preferences: &[String],
) -> Vec<String> {
    let lower = query.to_lowercase();
    let curated: &[&str] = TOPIC_SOURCES
        .iter()
        .find(|(topic, _)| lower.contains(topic))
        .map(|(_, urls)| urls.as_slice())
        .unwrap_or(GENERIC_SOURCES.as_slice());

    let mut out: Vec<String> = Vec::new();
    for url in preferences {
        if !out.iter().any(|u| u == url) {
            out.push(url.clone());
        }
    }
    for url in curated {
        if !out.iter().any(|u| u == url) {
            out.push((*url).to_string());
        }
    }
    out.truncate(max_sources);
    out
}
