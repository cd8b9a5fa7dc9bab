//! Engine error types.
//!
//! Two families: fail-fast programmer errors (`DimensionMismatch`) and
//! recoverable operational errors. Fetch and embedding failures are always
//! absorbed inside the compiler's retry-then-fallback path and never reach
//! the public API; `DecisionTimeout` and `DecisionFailed` are the errors a
//! `submit` caller is expected to handle.

/// Result alias used throughout the engine.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the dyad engine core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Vector length does not match the store's configured dimension.
    /// This is a programmer error: vectors are never truncated or padded.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Network or timeout failure while fetching a page.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The embedding backend was unavailable or rejected the input.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// `submit` waited past its deadline without a completed decision.
    #[error("decision {decision_id} timed out after {waited_ms}ms")]
    DecisionTimeout { decision_id: String, waited_ms: u64 },

    /// A decision reached a terminal failure instead of a result.
    #[error("decision {decision_id} failed: {message}")]
    DecisionFailed { decision_id: String, message: String },

    /// Multi-hop retrieval was invoked with no queries.
    #[error("multi-hop retrieval requires at least one query")]
    EmptyQuerySet,

    /// The submission channel to the sync loop is closed (engine shut down).
    #[error("decision channel closed")]
    ChannelClosed,
}
