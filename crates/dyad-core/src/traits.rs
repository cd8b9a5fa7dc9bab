//! External collaborator traits.
//!
//! The engine core consumes long-term memory, ethics scoring, privacy
//! screening, and self-model updates as interfaces only; their
//! implementations live in outer layers. Each trait ships with a `Null*`
//! default so the engine constructs and runs without any collaborator wired
//! in. Collaborator failures propagate only their own contract's fields;
//! the operational worker treats an unavailable privacy guard as "unknown"
//! and proceeds (fail-open; every such event is logged at `warn`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A memory snippet returned by the long-term memory collaborator.
/// Either field may be empty; retrieval uses whichever is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnippet {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub summary: String,
}

/// Long-term memory: relevance lookup and episodic write-back.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    async fn relevant_memories(&self, query: &str, limit: usize) -> Vec<MemorySnippet>;

    async fn store_episode(&self, record: serde_json::Value);
}

/// Verdict from the personality/ethics collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthicalVerdict {
    pub approved: bool,
    pub overall_score: f32,
    pub violations: Vec<String>,
}

/// Ethics scoring for a proposed action. The heuristics themselves are out
/// of scope; only this call contract matters to the engine.
#[async_trait]
pub trait EthicsEvaluator: Send + Sync {
    async fn evaluate(&self, action: &str, context: &serde_json::Value) -> EthicalVerdict;
}

/// Verdict from the privacy collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyVerdict {
    pub allowed: bool,
}

/// Privacy screening of raw decision input. `Err` means the guard itself was
/// unavailable, which the engine treats as unknown rather than as a denial.
#[async_trait]
pub trait PrivacyGuard: Send + Sync {
    async fn evaluate(&self, input: &str) -> Result<PrivacyVerdict, String>;
}

/// Self-model event sink (fire-and-forget).
#[async_trait]
pub trait SelfModel: Send + Sync {
    async fn record_event(&self, event: serde_json::Value);
}

// ---------------------------------------------------------------------------
// Null defaults
// ---------------------------------------------------------------------------

/// Memory collaborator that remembers nothing.
#[derive(Debug, Default)]
pub struct NullMemory;

#[async_trait]
impl MemoryProvider for NullMemory {
    async fn relevant_memories(&self, _query: &str, _limit: usize) -> Vec<MemorySnippet> {
        Vec::new()
    }

    async fn store_episode(&self, _record: serde_json::Value) {}
}

/// Ethics collaborator that approves everything with a neutral score.
#[derive(Debug, Default)]
pub struct NullEthics;

#[async_trait]
impl EthicsEvaluator for NullEthics {
    async fn evaluate(&self, _action: &str, _context: &serde_json::Value) -> EthicalVerdict {
        EthicalVerdict {
            approved: true,
            overall_score: 0.5,
            violations: Vec::new(),
        }
    }
}

/// Privacy collaborator that allows everything.
#[derive(Debug, Default)]
pub struct NullPrivacy;

#[async_trait]
impl PrivacyGuard for NullPrivacy {
    async fn evaluate(&self, _input: &str) -> Result<PrivacyVerdict, String> {
        Ok(PrivacyVerdict { allowed: true })
    }
}

/// Self-model sink that discards events.
#[derive(Debug, Default)]
pub struct NullSelfModel;

#[async_trait]
impl SelfModel for NullSelfModel {
    async fn record_event(&self, _event: serde_json::Value) {}
}
