//! Integration test: decision flow. Verifies the full submit, sync tick,
//! resolve path with a stubbed page fetcher (no network).
//!
//! ## Scenario
//! 1. Build an engine with a canned-HTML fetcher and a fast sync interval.
//! 2. Submit a knowledge question and **confirm** it routes to the
//!    operational worker and its reasoning cites retrieved knowledge.
//! 3. Exercise the failure surfaces: submit timeout without a running sync
//!    loop, privacy denial, privacy-guard outage (fail-open), ethics
//!    rejection, empty input, and duplicate-decision stability decay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dyad_core::{
    Collaborators, CoreError, CoreResult, Decision, DecisionKind, EngineConfig, EthicalVerdict,
    EthicsEvaluator, HashEmbedder, Orchestrator, PageFetcher, PrivacyGuard, PrivacyVerdict,
};

/// Serves the same article for every URL.
struct StaticFetcher;

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> CoreResult<String> {
        Ok(format!(
            "<html><head><title>Machine Learning Overview</title></head><body>\
             <p>{body}</p><p>References: Mitchell et al, 1997.</p>\
             </body></html>",
            body = "Machine learning studies algorithms that improve through \
                    experience. Supervised methods fit labelled examples, while \
                    unsupervised methods uncover structure in raw observations. "
                .repeat(4)
        ))
    }
}

struct DenyPrivacy;

#[async_trait]
impl PrivacyGuard for DenyPrivacy {
    async fn evaluate(&self, _input: &str) -> Result<PrivacyVerdict, String> {
        Ok(PrivacyVerdict { allowed: false })
    }
}

struct BrokenPrivacy;

#[async_trait]
impl PrivacyGuard for BrokenPrivacy {
    async fn evaluate(&self, _input: &str) -> Result<PrivacyVerdict, String> {
        Err("guard offline".into())
    }
}

struct RejectingEthics;

#[async_trait]
impl EthicsEvaluator for RejectingEthics {
    async fn evaluate(&self, _action: &str, _context: &serde_json::Value) -> EthicalVerdict {
        EthicalVerdict {
            approved: false,
            overall_score: 0.2,
            violations: vec!["potential harm to bystanders".into()],
        }
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        sync_interval: Duration::from_millis(25),
        submit_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(10),
        fetch_timeout: Duration::from_secs(1),
        vector_dim: 64,
        max_summary_len: 300,
        decision_threshold: 0.8,
    }
}

fn engine_with(collaborators: Collaborators) -> Arc<Orchestrator> {
    let config = fast_config();
    let embedder = Arc::new(HashEmbedder::new(config.vector_dim));
    Arc::new(Orchestrator::with_components(
        config,
        Arc::new(StaticFetcher),
        embedder,
        collaborators,
    ))
}

#[tokio::test]
async fn knowledge_question_routes_operational_and_cites_retrieval() {
    let engine = engine_with(Collaborators::default());
    let _loop_handle = engine.clone().spawn_sync_loop();

    let result = engine
        .submit(
            "Can you help me understand machine learning?",
            serde_json::json!({}),
        )
        .await
        .expect("decision should resolve");

    assert_eq!(result.kind, DecisionKind::Operational);
    assert_eq!(result.action, "respond");
    assert!(
        result.confidence >= 0.7,
        "operational answers start at 0.7 confidence, got {}",
        result.confidence
    );
    assert!(
        result.reasoning.contains("grounded in retrieved knowledge"),
        "reasoning should cite the retrieval pipeline: {}",
        result.reasoning
    );
    assert!(result.arbitration.is_none(), "single route needs no arbitration");

    let status = engine.status().await;
    assert!(status.artifact_count > 0, "retrieval should register artifacts");
    assert_eq!(status.state.decisions_processed, 1);
}

#[tokio::test]
async fn submit_times_out_when_no_sync_loop_runs() {
    let engine = engine_with(Collaborators::default());

    let started = Instant::now();
    let err = engine
        .submit("help me with this", serde_json::json!({ "timeout_ms": 200 }))
        .await
        .expect_err("no tick runs, so the decision can never complete");
    let elapsed = started.elapsed();

    match err {
        CoreError::DecisionTimeout { waited_ms, .. } => {
            assert!(waited_ms >= 200, "reported wait {} below deadline", waited_ms);
        }
        other => panic!("expected DecisionTimeout, got {:?}", other),
    }
    // Deadline 200ms plus one 10ms poll plus scheduling slack; a fixed
    // full-interval sleep past the deadline would blow this bound.
    assert!(
        elapsed < Duration::from_millis(400),
        "timeout should fire within one poll of the deadline, took {:?}",
        elapsed
    );
}

#[tokio::test]
async fn privacy_denial_blocks_the_decision() {
    let engine = engine_with(Collaborators {
        privacy: Arc::new(DenyPrivacy),
        ..Collaborators::default()
    });
    let _loop_handle = engine.clone().spawn_sync_loop();

    let result = engine
        .submit("help me collect personal records", serde_json::json!({}))
        .await
        .expect("a blocked decision still completes");

    assert_eq!(result.action, "privacy_blocked");
    assert!(result.confidence >= 0.9);
}

#[tokio::test]
async fn unavailable_privacy_guard_fails_open() {
    let engine = engine_with(Collaborators {
        privacy: Arc::new(BrokenPrivacy),
        ..Collaborators::default()
    });
    let _loop_handle = engine.clone().spawn_sync_loop();

    let result = engine
        .submit("help me configure the cluster", serde_json::json!({}))
        .await
        .expect("guard outage must not fail the decision");

    assert_eq!(result.action, "respond", "fail-open proceeds with processing");
}

#[tokio::test]
async fn ethics_rejection_surfaces_from_the_strategic_route() {
    let engine = engine_with(Collaborators {
        ethics: Arc::new(RejectingEthics),
        ..Collaborators::default()
    });
    let _loop_handle = engine.clone().spawn_sync_loop();

    let result = engine
        .submit("should we deploy this untested patch", serde_json::json!({}))
        .await
        .expect("rejected decisions still resolve");

    assert_eq!(result.kind, DecisionKind::Ethical);
    assert_eq!(result.action, "ethically_rejected");
    assert!(
        result.reasoning.contains("potential harm"),
        "violations propagate into reasoning: {}",
        result.reasoning
    );
    let expected = 0.6 + 0.4 * 0.2;
    assert!((result.confidence - expected).abs() < 1e-6);
}

#[tokio::test]
async fn empty_input_fails_the_decision() {
    let engine = engine_with(Collaborators::default());
    let _loop_handle = engine.clone().spawn_sync_loop();

    let err = engine
        .submit("   ", serde_json::json!({}))
        .await
        .expect_err("blank input has nothing to decide");
    assert!(matches!(err, CoreError::DecisionFailed { .. }));
}

#[tokio::test]
async fn general_input_is_arbitrated_by_both_workers() {
    let engine = engine_with(Collaborators::default());
    let _loop_handle = engine.clone().spawn_sync_loop();

    let result = engine
        .submit("good morning everyone", serde_json::json!({}))
        .await
        .expect("general decisions resolve through arbitration");

    assert_eq!(result.kind, DecisionKind::General);
    assert_eq!(result.resolved_by, "both");
    assert!(
        result.arbitration.is_some(),
        "dual-routed decisions record their arbitration mode"
    );
}

#[tokio::test]
async fn duplicate_decision_id_decays_stability_once() {
    let engine = engine_with(Collaborators::default());

    let decision = Decision::new(
        DecisionKind::Strategic,
        "plan the rollout",
        serde_json::json!({}),
    );
    engine.enqueue_decision(decision.clone()).unwrap();
    engine.enqueue_decision(decision).unwrap();
    engine.run_sync_tick().await;

    let status = engine.status().await;
    assert_eq!(
        status.state.decisions_processed, 1,
        "the duplicate must not produce a second result"
    );
    assert!(
        (status.state.stability - 0.95).abs() < 1e-6,
        "one errored tick decays stability by 5%, got {}",
        status.state.stability
    );
}
