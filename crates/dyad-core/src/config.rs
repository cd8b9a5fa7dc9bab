//! Engine configuration loaded from `DYAD_*` environment variables.
//!
//! Unset or invalid values fall back to clamped defaults, so the engine
//! always constructs. Change timing and thresholds without code edits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cross-worker synchronization interval: 5 seconds.
const DEFAULT_SYNC_INTERVAL_MS: u64 = 5_000;

/// Default deadline for a `submit` call: 30 seconds.
const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 30_000;

/// Interval between result-table polls inside `submit`.
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Bound on a single page fetch during knowledge compilation.
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Embedding dimension (bag-of-hashed-tokens buckets; MiniLM-class width).
const DEFAULT_VECTOR_DIM: usize = 384;

/// Ceiling on an artifact's extractive summary, in characters.
const DEFAULT_MAX_SUMMARY_LEN: usize = 500;

/// Strategic confidence threshold for the executive-override arbitration rule.
const DEFAULT_DECISION_THRESHOLD: f32 = 0.8;

/// Engine-wide configuration.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | DYAD_SYNC_INTERVAL_MS | 5000 | Synchronization tick cadence (min 100). |
/// | DYAD_SUBMIT_TIMEOUT_MS | 30000 | Default `submit` deadline (min 100). |
/// | DYAD_FETCH_TIMEOUT_SECS | 10 | Page-fetch bound during compilation (min 1). |
/// | DYAD_VECTOR_DIM | 384 | Embedding dimension (min 8). |
/// | DYAD_MAX_SUMMARY_LEN | 500 | Artifact summary ceiling in chars (min 80). |
/// | DYAD_DECISION_THRESHOLD | 0.8 | Executive-override confidence threshold, clamped to [0,1]. |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between synchronization ticks.
    pub sync_interval: Duration,
    /// Default deadline for `submit` (overridable per call via `context.timeout_ms`).
    pub submit_timeout: Duration,
    /// Poll cadence while `submit` waits for its decision to complete.
    pub poll_interval: Duration,
    /// Bound on a single page fetch.
    pub fetch_timeout: Duration,
    /// Embedding / vector-store dimension.
    pub vector_dim: usize,
    /// Maximum artifact summary length in characters.
    pub max_summary_len: usize,
    /// Strategic confidence threshold for the executive-override rule.
    pub decision_threshold: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_millis(
                env_u64("DYAD_SYNC_INTERVAL_MS", DEFAULT_SYNC_INTERVAL_MS).max(100),
            ),
            submit_timeout: Duration::from_millis(
                env_u64("DYAD_SUBMIT_TIMEOUT_MS", DEFAULT_SUBMIT_TIMEOUT_MS).max(100),
            ),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            fetch_timeout: Duration::from_secs(
                env_u64("DYAD_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS).max(1),
            ),
            vector_dim: env_u64("DYAD_VECTOR_DIM", DEFAULT_VECTOR_DIM as u64).max(8) as usize,
            max_summary_len: env_u64("DYAD_MAX_SUMMARY_LEN", DEFAULT_MAX_SUMMARY_LEN as u64)
                .max(80) as usize,
            decision_threshold: env_f32("DYAD_DECISION_THRESHOLD", DEFAULT_DECISION_THRESHOLD)
                .clamp(0.0, 1.0),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_f32(name: &str, default: f32) -> f32 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert!(cfg.sync_interval >= Duration::from_millis(100));
        assert!(cfg.vector_dim >= 8);
        assert!((0.0..=1.0).contains(&cfg.decision_threshold));
    }
}
