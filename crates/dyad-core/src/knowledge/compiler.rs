//! Knowledge compilation: URL → scored, embedded artifact.
//!
//! Pipeline: fetch the page with a bounded timeout, extract readable text
//! (script/style/nav/footer/ad-like regions stripped), produce an extractive
//! summary, embed it, score provenance, and register the artifact into the
//! vector store. A failed attempt retries the whole pipeline once; a second
//! failure degrades to a fallback artifact (provenance 0, no embedding)
//! instead of surfacing an error.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use uuid::Uuid;

use super::embedding::Embedder;
use super::vector_store::VectorStore;
use super::{fnv1a_hex, Artifact, FeedbackEntry, RetrievalPattern};
use crate::error::{CoreError, CoreResult};

/// Hosts treated as reputable beyond the `.edu`/`.gov`/`.org` suffix rule.
static REPUTABLE_HOSTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "arxiv.org",
        "wikipedia.org",
        "nature.com",
        "sciencemag.org",
        "acm.org",
        "ieee.org",
        "nih.gov",
        "britannica.com",
        "scholar.google.com",
    ]
});

/// Keywords whose presence in the text suggests cited material.
const CITATION_KEYWORDS: [&str; 5] = ["references", "bibliography", "citation", "doi:", "et al"];

/// Fetches raw HTML for a URL. Seam for tests and alternative transports.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CoreResult<String>;
}

/// reqwest-backed fetcher with a bounded timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("dyad-engine/0.1")
            .build()
            .map_err(|e| CoreError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Fetch(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::Fetch(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Options for a single compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Pattern tag recorded on a successful artifact.
    pub pattern: RetrievalPattern,
    /// The query that led to this URL, recorded in artifact metadata.
    pub query: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            pattern: RetrievalPattern::WebScrapeV1,
            query: None,
        }
    }
}

/// Turns a URL into a scored, embedded [`Artifact`] and keeps the registry
/// of every artifact produced so far (for feedback and composite ranking).
pub struct KnowledgeCompiler {
    fetcher: Arc<dyn PageFetcher>,
    embedder: Arc<dyn Embedder>,
    store: Arc<Mutex<VectorStore>>,
    artifacts: DashMap<String, Artifact>,
    max_summary_len: usize,
}

impl KnowledgeCompiler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        embedder: Arc<dyn Embedder>,
        store: Arc<Mutex<VectorStore>>,
        max_summary_len: usize,
    ) -> Self {
        Self {
            fetcher,
            embedder,
            store,
            artifacts: DashMap::new(),
            max_summary_len,
        }
    }

    pub fn artifact(&self, id: &str) -> Option<Artifact> {
        self.artifacts.get(id).map(|a| a.clone())
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Compiles a URL into an artifact. Fetch/embedding failures retry the
    /// whole pipeline once, then degrade to a fallback artifact; this path
    /// never surfaces an operational error. Only programmer errors (a vector
    /// that does not match the store dimension) propagate.
    pub async fn compile_from_url(
        &self,
        url: &str,
        options: &CompileOptions,
    ) -> CoreResult<Artifact> {
        let attempt = match self.attempt(url).await {
            Ok(compiled) => Ok(compiled),
            Err(first) => {
                warn!(
                    target: "dyad::compiler",
                    url,
                    error = %first,
                    "compilation attempt failed, retrying pipeline once"
                );
                self.attempt(url).await
            }
        };

        let artifact = match attempt {
            Ok(compiled) => {
                let artifact = self.assemble(url, compiled, options);
                self.register(&artifact)?;
                artifact
            }
            Err(second) => {
                warn!(
                    target: "dyad::compiler",
                    url,
                    error = %second,
                    "compilation failed twice, emitting fallback artifact"
                );
                self.fallback_artifact(url, &second, options)
            }
        };

        self.artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(artifact)
    }

    /// Appends a timestamped feedback entry. Unknown ids are a no-op that
    /// returns `false`; this never raises.
    pub fn add_feedback(&self, artifact_id: &str, score: f32, comment: &str) -> bool {
        match self.artifacts.get_mut(artifact_id) {
            Some(mut artifact) => {
                artifact.feedback.push(FeedbackEntry {
                    score,
                    comment: comment.to_string(),
                    timestamp: Utc::now(),
                });
                true
            }
            None => false,
        }
    }

    /// Retags a registered artifact (batch failures become `Error`).
    pub(crate) fn retag(&self, artifact_id: &str, pattern: RetrievalPattern) {
        if let Some(mut artifact) = self.artifacts.get_mut(artifact_id) {
            artifact.pattern = pattern;
        }
    }

    async fn attempt(&self, url: &str) -> CoreResult<Compiled> {
        let html = self.fetcher.fetch(url).await?;
        let (title, text) = extract_readable_text(&html);
        let summary = extractive_summary(&text, self.max_summary_len);
        let embedding = self.embedder.embed_text(&summary).await?;
        Ok(Compiled {
            title,
            text,
            summary,
            embedding,
        })
    }

    fn assemble(&self, url: &str, compiled: Compiled, options: &CompileOptions) -> Artifact {
        let title = compiled.title.clone().unwrap_or_else(|| url.to_string());
        let provenance = provenance_score(url, compiled.title.as_deref(), &compiled.text);
        debug!(
            target: "dyad::compiler",
            url,
            provenance,
            text_len = compiled.text.len(),
            "artifact compiled"
        );
        Artifact {
            id: Uuid::new_v4().to_string(),
            title,
            summary: compiled.summary,
            source_url: url.to_string(),
            content_hash: Some(fnv1a_hex(&compiled.text)),
            embedding: compiled.embedding,
            provenance_score: provenance,
            pattern: options.pattern,
            created_at: Utc::now(),
            metadata: serde_json::json!({
                "domain": host_of(url),
                "query": options.query,
                "fetched_at": Utc::now().to_rfc3339(),
            }),
            feedback: Vec::new(),
        }
    }

    fn fallback_artifact(&self, url: &str, reason: &CoreError, options: &CompileOptions) -> Artifact {
        Artifact {
            id: Uuid::new_v4().to_string(),
            title: url.to_string(),
            summary: format!("Knowledge compilation failed for {url}: {reason}"),
            source_url: url.to_string(),
            content_hash: None,
            embedding: Vec::new(),
            provenance_score: 0.0,
            pattern: RetrievalPattern::Fallback,
            created_at: Utc::now(),
            metadata: serde_json::json!({
                "domain": host_of(url),
                "query": options.query,
                "failure": reason.to_string(),
            }),
            feedback: Vec::new(),
        }
    }

    fn register(&self, artifact: &Artifact) -> CoreResult<()> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| CoreError::Embedding("vector store lock poisoned".into()))?;
        store.add(
            artifact.id.clone(),
            artifact.embedding.clone(),
            serde_json::json!({
                "source_url": artifact.source_url,
                "title": artifact.title,
            }),
        )
    }
}

struct Compiled {
    title: Option<String>,
    text: String,
    summary: String,
    embedding: Vec<f32>,
}

// ---------------------------------------------------------------------------
// Extraction, summarization, provenance
// ---------------------------------------------------------------------------

/// Extracts the page title and readable body text. Paragraph, heading, and
/// list-item text is kept; anything inside script/style/nav/footer/aside or
/// an ad-like classed container is dropped.
pub(crate) fn extract_readable_text(html: &str) -> (Option<String>, String) {
    let doc = Html::parse_document(html);

    let title_sel = Selector::parse("title").unwrap_or_else(|_| unreachable!());
    let title = doc
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty());

    let content_sel =
        Selector::parse("p, h1, h2, h3, h4, h5, h6, li").unwrap_or_else(|_| unreachable!());
    let mut chunks: Vec<String> = Vec::new();
    for el in doc.select(&content_sel) {
        if in_stripped_region(&el) {
            continue;
        }
        let chunk = el.text().collect::<String>();
        let chunk = chunk.split_whitespace().collect::<Vec<_>>().join(" ");
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
    }
    (title, chunks.join(" "))
}

fn in_stripped_region(el: &ElementRef<'_>) -> bool {
    for ancestor in el.ancestors() {
        let Some(parent) = ElementRef::wrap(ancestor) else {
            continue;
        };
        let name = parent.value().name();
        if matches!(name, "script" | "style" | "nav" | "footer" | "aside") {
            return true;
        }
        if parent.value().classes().any(ad_like_class) {
            return true;
        }
    }
    false
}

fn ad_like_class(class: &str) -> bool {
    let c = class.to_ascii_lowercase();
    c == "ad" || c == "ads" || c.contains("advert") || c.contains("sponsor") || c.contains("promo")
}

/// Extractive summary: the text itself when it fits, otherwise leading
/// sentences of at least 20 characters joined with ". ", ellipsis-truncated
/// if the result still exceeds `max_len`.
pub(crate) fn extractive_summary(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let mut picked: Vec<&str> = Vec::new();
    let mut used = 0usize;
    for sentence in text.split(['.', '!', '?']) {
        let sentence = sentence.trim();
        if sentence.len() < 20 {
            continue;
        }
        let cost = sentence.chars().count() + if picked.is_empty() { 0 } else { 2 };
        if used + cost > max_len && !picked.is_empty() {
            break;
        }
        used += cost;
        picked.push(sentence);
        if used >= max_len {
            break;
        }
    }

    let mut summary = if picked.is_empty() {
        text.to_string()
    } else {
        picked.join(". ")
    };
    if summary.chars().count() > max_len {
        summary = summary.chars().take(max_len.saturating_sub(1)).collect();
        summary.push('…');
    }
    summary
}

/// Heuristic source-trust estimate in [0,1]: 0.5 base, +0.2 reputable
/// domain, +0.1 non-trivial title, +0.1 substantial text, +0.1 citation
/// keywords.
pub(crate) fn provenance_score(url: &str, title: Option<&str>, text: &str) -> f32 {
    let mut score = 0.5f32;
    let host = host_of(url);
    if is_reputable_host(&host) {
        score += 0.2;
    }
    if title.map(|t| t.trim().len() > 3).unwrap_or(false) {
        score += 0.1;
    }
    if text.len() > 500 {
        score += 0.1;
    }
    let lower = text.to_lowercase();
    if CITATION_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

fn is_reputable_host(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    if host.ends_with(".edu") || host.ends_with(".gov") || host.ends_with(".org") {
        return true;
    }
    REPUTABLE_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

pub(crate) fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
