//! Decision orchestration: queue, synchronization tick, routing,
//! arbitration, and the public submit/status/health surface.
//!
//! All mutable engine state (decision queue, worker states, aggregate
//! metrics) lives behind one owner: the synchronization tick. Submitters
//! never touch it directly; they hand decisions over an mpsc channel and
//! poll the completed-decision table for results. Decisions are processed
//! in queue order within a tick; priority reordering from load balancing
//! only takes effect between ticks.

mod arbitration;
mod worker;

pub use arbitration::{arbitrate, ArbitrationMode, ArbitrationOutcome};
pub use worker::{
    goal_overlap, InterWorkerMessage, OperationalWorker, StrategicWorker, WorkerRole, WorkerState,
    WorkerVerdict,
};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::knowledge::compiler::{HttpFetcher, KnowledgeCompiler, PageFetcher};
use crate::knowledge::embedding::{Embedder, HashEmbedder};
use crate::knowledge::retrieval::RetrievalCoordinator;
use crate::knowledge::vector_store::VectorStore;
use crate::traits::{
    EthicsEvaluator, MemoryProvider, NullEthics, NullMemory, NullPrivacy, NullSelfModel,
    PrivacyGuard, SelfModel,
};

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// How many queued operational decisions one tick may migrate to the
/// strategic worker when loads diverge.
const MAX_MIGRATED_PER_TICK: usize = 2;

/// Kind of work a decision represents. Unrecognized inputs classify as
/// `General` rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Strategic,
    Ethical,
    Operational,
    #[serde(rename = "real-time")]
    RealTime,
    General,
    ComplexQuery,
}

impl DecisionKind {
    /// Keyword classification of raw input, rules tried in order.
    pub fn classify(input: &str) -> Self {
        let lower = input.to_lowercase();
        if lower.contains('?') && input.len() > 100 {
            return DecisionKind::ComplexQuery;
        }
        if lower.contains("plan") || lower.contains("strategy") {
            return DecisionKind::Strategic;
        }
        if lower.contains("should") || lower.contains("ethical") {
            return DecisionKind::Ethical;
        }
        if lower.contains("help") || lower.contains("assist") {
            return DecisionKind::Operational;
        }
        DecisionKind::General
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Strategic => "strategic",
            DecisionKind::Ethical => "ethical",
            DecisionKind::Operational => "operational",
            DecisionKind::RealTime => "real-time",
            DecisionKind::General => "general",
            DecisionKind::ComplexQuery => "complex_query",
        }
    }
}

/// A unit of work submitted to the orchestrator. Immutable once a result or
/// error has been attached in the completed table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub kind: DecisionKind,
    pub input: String,
    pub context: serde_json::Value,
    /// 0–1; urgent submissions default to 1.0, everything else 0.5.
    pub priority: f32,
    pub submitted_at: DateTime<Utc>,
    /// Set by load balancing to force a route on the next tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_override: Option<WorkerRole>,
}

impl Decision {
    pub fn new(kind: DecisionKind, input: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            input: input.into(),
            context,
            priority: 0.5,
            submitted_at: Utc::now(),
            route_override: None,
        }
    }

    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority.clamp(0.0, 1.0);
        self
    }
}

/// Terminal result attached to a decision exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision_id: String,
    pub kind: DecisionKind,
    pub action: String,
    pub confidence: f32,
    pub reasoning: String,
    /// Which worker(s) resolved it: "strategic", "operational", or "both".
    pub resolved_by: String,
    /// Present only when both workers ran and arbitration resolved them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arbitration: Option<ArbitrationMode>,
    pub completed_at: DateTime<Utc>,
}

enum DecisionOutcome {
    Completed(DecisionResult),
    Failed(String),
}

// ---------------------------------------------------------------------------
// Aggregate state
// ---------------------------------------------------------------------------

/// Derived aggregate over both workers plus cumulative engine metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub awareness: f32,
    pub coherence: f32,
    pub integration: f32,
    pub decisions_processed: u64,
    pub executive_overrides: u64,
    pub last_sync_latency_ms: u64,
    /// Starts at 1.0 and decays by 5% on every errored tick.
    pub stability: f32,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            awareness: 0.5,
            coherence: 0.5,
            integration: 0.5,
            decisions_processed: 0,
            executive_overrides: 0,
            last_sync_latency_ms: 0,
            stability: 1.0,
        }
    }
}

/// Snapshot returned by [`Orchestrator::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub strategic: WorkerState,
    pub operational: WorkerState,
    pub queue_depth: usize,
    pub artifact_count: usize,
}

/// Health of one engine component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    pub detail: String,
}

/// Report returned by [`Orchestrator::health_check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// "ok" when every component is healthy, otherwise "degraded".
    pub status: String,
    pub components: Vec<ComponentHealth>,
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// External collaborator set. Defaults to the `Null*` implementations so
/// the engine runs standalone.
#[derive(Clone)]
pub struct Collaborators {
    pub memory: Arc<dyn MemoryProvider>,
    pub ethics: Arc<dyn EthicsEvaluator>,
    pub privacy: Arc<dyn PrivacyGuard>,
    pub self_model: Arc<dyn SelfModel>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            memory: Arc::new(NullMemory),
            ethics: Arc::new(NullEthics),
            privacy: Arc::new(NullPrivacy),
            self_model: Arc::new(NullSelfModel),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

enum Route {
    Single(WorkerRole),
    Both,
}

/// Mutable engine state owned exclusively by the synchronization tick.
struct Inner {
    intake: mpsc::UnboundedReceiver<Decision>,
    queue: VecDeque<Decision>,
    strategic: StrategicWorker,
    operational: OperationalWorker,
    messages: Vec<InterWorkerMessage>,
    state: EngineState,
}

/// Caller-owned engine instance: owns both workers, the retrieval stack,
/// and all mutable state. No process-wide globals.
pub struct Orchestrator {
    config: EngineConfig,
    inner: Mutex<Inner>,
    intake_tx: mpsc::UnboundedSender<Decision>,
    completed: DashMap<String, DecisionOutcome>,
    retrieval: Arc<RetrievalCoordinator>,
    store: Arc<StdMutex<VectorStore>>,
    self_model: Arc<dyn SelfModel>,
    memory: Arc<dyn MemoryProvider>,
}

impl Orchestrator {
    /// Builds an engine with the default HTTP fetcher, the model-free hash
    /// embedder, and null collaborators.
    pub fn new(config: EngineConfig) -> CoreResult<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(config.vector_dim));
        Ok(Self::with_components(
            config,
            fetcher,
            embedder,
            Collaborators::default(),
        ))
    }

    /// Builds an engine with explicit fetcher, embedder, and collaborators.
    pub fn with_components(
        config: EngineConfig,
        fetcher: Arc<dyn PageFetcher>,
        embedder: Arc<dyn Embedder>,
        collaborators: Collaborators,
    ) -> Self {
        let store = Arc::new(StdMutex::new(VectorStore::new(config.vector_dim)));
        let compiler = Arc::new(KnowledgeCompiler::new(
            fetcher,
            embedder.clone(),
            store.clone(),
            config.max_summary_len,
        ));
        let retrieval = Arc::new(RetrievalCoordinator::new(
            compiler,
            embedder,
            store.clone(),
        ));
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        let inner = Inner {
            intake: intake_rx,
            queue: VecDeque::new(),
            strategic: StrategicWorker::new(collaborators.ethics.clone()),
            operational: OperationalWorker::new(
                retrieval.clone(),
                collaborators.memory.clone(),
                collaborators.privacy.clone(),
            ),
            messages: Vec::new(),
            state: EngineState::default(),
        };
        Self {
            config,
            inner: Mutex::new(inner),
            intake_tx,
            completed: DashMap::new(),
            retrieval,
            store,
            self_model: collaborators.self_model,
            memory: collaborators.memory,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn retrieval(&self) -> &Arc<RetrievalCoordinator> {
        &self.retrieval
    }

    // -----------------------------------------------------------------------
    // Public decision API
    // -----------------------------------------------------------------------

    /// Classifies, enqueues, and waits for the input to be decided. Polls
    /// the completed table every `poll_interval` until the result appears
    /// or the deadline (default from config, overridable via
    /// `context.timeout_ms`) passes with `DecisionTimeout`.
    pub async fn submit(
        &self,
        input: &str,
        context: serde_json::Value,
    ) -> CoreResult<DecisionResult> {
        let kind = DecisionKind::classify(input);
        let priority = if truthy(context.get("urgent")) { 1.0 } else { 0.5 };
        let timeout = context
            .get("timeout_ms")
            .and_then(|v| v.as_u64())
            .map(std::time::Duration::from_millis)
            .unwrap_or(self.config.submit_timeout);

        let decision = Decision::new(kind, input, context).with_priority(priority);
        let id = decision.id.clone();
        info!(
            target: "dyad::orchestrator",
            decision_id = %id,
            kind = kind.as_str(),
            priority,
            "decision submitted"
        );
        self.enqueue_decision(decision)?;

        let started = Instant::now();
        loop {
            if let Some(outcome) = self.completed.get(&id) {
                return match &*outcome {
                    DecisionOutcome::Completed(result) => Ok(result.clone()),
                    DecisionOutcome::Failed(message) => Err(CoreError::DecisionFailed {
                        decision_id: id.clone(),
                        message: message.clone(),
                    }),
                };
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(CoreError::DecisionTimeout {
                    decision_id: id,
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            let remaining = timeout - elapsed;
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }
    }

    /// Hands a pre-built decision to the tick owner without waiting.
    pub fn enqueue_decision(&self, decision: Decision) -> CoreResult<()> {
        self.intake_tx
            .send(decision)
            .map_err(|_| CoreError::ChannelClosed)
    }

    /// Queues a message for delivery to `target` on the next tick.
    pub async fn send_worker_message(&self, target: WorkerRole, content: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.messages.push(InterWorkerMessage {
            target,
            content: content.into(),
        });
    }

    /// Proxies feedback to the artifact registry; `false` for unknown ids.
    pub fn add_artifact_feedback(&self, artifact_id: &str, score: f32, comment: &str) -> bool {
        self.retrieval.add_artifact_feedback(artifact_id, score, comment)
    }

    pub async fn status(&self) -> EngineStatus {
        let inner = self.inner.lock().await;
        EngineStatus {
            state: inner.state.clone(),
            strategic: inner.strategic.state.clone(),
            operational: inner.operational.state.clone(),
            queue_depth: inner.queue.len(),
            artifact_count: self.retrieval.compiler().artifact_count(),
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        let inner = self.inner.lock().await;
        let store_ok = self.store.lock().is_ok();
        let components = vec![
            ComponentHealth {
                name: "strategic_worker".into(),
                healthy: inner.strategic.healthy(),
                detail: format!("stress {:.2}", inner.strategic.state.load),
            },
            ComponentHealth {
                name: "operational_worker".into(),
                healthy: inner.operational.healthy(),
                detail: format!("load {:.2}", inner.operational.state.load),
            },
            ComponentHealth {
                name: "vector_store".into(),
                healthy: store_ok,
                detail: if store_ok {
                    format!(
                        "{} vectors",
                        self.store.lock().map(|s| s.len()).unwrap_or(0)
                    )
                } else {
                    "lock poisoned".into()
                },
            },
            ComponentHealth {
                name: "stability".into(),
                healthy: inner.state.stability > 0.5,
                detail: format!("{:.3}", inner.state.stability),
            },
        ];
        let status = if components.iter().all(|c| c.healthy) {
            "ok"
        } else {
            "degraded"
        };
        HealthReport {
            status: status.into(),
            components,
        }
    }

    // -----------------------------------------------------------------------
    // Synchronization tick
    // -----------------------------------------------------------------------

    /// Spawns the timer-driven synchronization loop. A failing tick decays
    /// stability and is logged; the timer always continues.
    pub fn spawn_sync_loop(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        info!(
            target: "dyad::orchestrator",
            interval_ms = self.config.sync_interval.as_millis() as u64,
            "synchronization loop started"
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sync_interval);
            loop {
                interval.tick().await;
                self.run_sync_tick().await;
            }
        })
    }

    /// One synchronization pass: deliver messages, recompute aggregate
    /// state, process queued decisions, rebalance, record latency.
    pub async fn run_sync_tick(&self) {
        let started = Instant::now();
        let mut inner = self.inner.lock().await;
        let mut tick_errored = false;

        // 1. Intake and inter-worker message delivery. Direction counts are
        //    observed before delivery; they feed the integration metric.
        drain_intake(&mut inner);
        let to_strategic = inner
            .messages
            .iter()
            .filter(|m| m.target == WorkerRole::Strategic)
            .count();
        let to_operational = inner.messages.len() - to_strategic;
        for message in std::mem::take(&mut inner.messages) {
            match message.target {
                WorkerRole::Strategic => inner.strategic.deliver(message.content),
                WorkerRole::Operational => inner.operational.deliver(message.content),
            }
        }

        // 2. Worker snapshots, then the derived aggregate.
        let queue_depth = inner.queue.len();
        inner.strategic.refresh_state(queue_depth);
        inner.operational.refresh_state(queue_depth);
        let overlap = goal_overlap(
            &inner.strategic.state.active_goals,
            &inner.operational.state.active_goals,
        );
        inner.state.awareness =
            0.6 * inner.strategic.state.awareness + 0.4 * inner.operational.state.awareness;
        inner.state.coherence =
            (inner.strategic.state.coherence + inner.operational.state.coherence) / 2.0;
        inner.state.integration = integration_metric(
            overlap,
            to_strategic,
            to_operational,
            inner.strategic.state.load,
            inner.operational.state.load,
        );

        // 3. Process the decisions queued at tick start, in order.
        let batch: Vec<Decision> = inner.queue.drain(..).collect();
        for decision in batch {
            if let Err(e) = self.process_decision(&mut inner, decision).await {
                error!(target: "dyad::orchestrator", error = %e, "decision processing errored");
                tick_errored = true;
            }
        }

        // 4. Load balancing over decisions that arrived while processing.
        //    Reordering takes effect on the next tick, never mid-tick.
        drain_intake(&mut inner);
        let strat_load = inner.strategic.state.load;
        let op_load = inner.operational.state.load;
        apply_load_balancing(&mut inner.queue, strat_load, op_load);

        // 5. Latency and stability bookkeeping.
        inner.state.last_sync_latency_ms = started.elapsed().as_millis() as u64;
        if tick_errored {
            inner.state.stability *= 0.95;
            warn!(
                target: "dyad::orchestrator",
                stability = inner.state.stability,
                "tick errored, stability decayed"
            );
        }
        debug!(
            target: "dyad::orchestrator",
            latency_ms = inner.state.last_sync_latency_ms,
            integration = inner.state.integration,
            "sync tick complete"
        );
    }

    async fn process_decision(&self, inner: &mut Inner, decision: Decision) -> CoreResult<()> {
        if self.completed.contains_key(&decision.id) {
            // A result is attached exactly once; a second attempt is a
            // programmer error surfaced as a tick failure.
            return Err(CoreError::DecisionFailed {
                decision_id: decision.id.clone(),
                message: "decision already has a terminal outcome".into(),
            });
        }

        if decision.input.trim().is_empty() {
            warn!(
                target: "dyad::orchestrator",
                decision_id = %decision.id,
                "rejecting decision with empty input"
            );
            self.completed.insert(
                decision.id.clone(),
                DecisionOutcome::Failed("decision input is empty".into()),
            );
            return Ok(());
        }

        let route = match decision.route_override {
            Some(role) => Route::Single(role),
            None => match decision.kind {
                DecisionKind::Strategic | DecisionKind::Ethical => {
                    Route::Single(WorkerRole::Strategic)
                }
                DecisionKind::Operational | DecisionKind::RealTime => {
                    Route::Single(WorkerRole::Operational)
                }
                DecisionKind::General | DecisionKind::ComplexQuery => Route::Both,
            },
        };

        let result = match route {
            Route::Single(role) => {
                let verdict = match role {
                    WorkerRole::Strategic => inner.strategic.process(&decision).await,
                    WorkerRole::Operational => inner.operational.process(&decision).await,
                };
                inner.messages.push(InterWorkerMessage {
                    target: role.peer(),
                    content: format!(
                        "{} resolved decision {} as {}",
                        role.as_str(),
                        decision.id,
                        verdict.action
                    ),
                });
                DecisionResult {
                    decision_id: decision.id.clone(),
                    kind: decision.kind,
                    action: verdict.action,
                    confidence: verdict.confidence,
                    reasoning: verdict.reasoning,
                    resolved_by: role.as_str().into(),
                    arbitration: None,
                    completed_at: Utc::now(),
                }
            }
            Route::Both => {
                let strategic_verdict = inner.strategic.process(&decision).await;
                let operational_verdict = inner.operational.process(&decision).await;
                let favor_strategic = truthy(decision.context.get("strategic"));
                let outcome = arbitrate(
                    &strategic_verdict,
                    &operational_verdict,
                    self.config.decision_threshold,
                    favor_strategic,
                );
                if outcome.mode == ArbitrationMode::ExecutiveOverride {
                    inner.state.executive_overrides += 1;
                }
                DecisionResult {
                    decision_id: decision.id.clone(),
                    kind: decision.kind,
                    action: outcome.action,
                    confidence: outcome.confidence,
                    reasoning: outcome.reasoning,
                    resolved_by: "both".into(),
                    arbitration: Some(outcome.mode),
                    completed_at: Utc::now(),
                }
            }
        };

        inner.state.decisions_processed += 1;
        let episode = serde_json::json!({
            "decision_id": result.decision_id,
            "kind": result.kind.as_str(),
            "action": result.action,
            "confidence": result.confidence,
        });
        self.self_model.record_event(episode.clone()).await;
        self.memory.store_episode(episode).await;
        debug!(
            target: "dyad::orchestrator",
            decision_id = %result.decision_id,
            action = %result.action,
            confidence = result.confidence,
            "decision completed"
        );
        self.completed
            .insert(result.decision_id.clone(), DecisionOutcome::Completed(result));
        Ok(())
    }
}

fn drain_intake(inner: &mut Inner) {
    while let Ok(decision) = inner.intake.try_recv() {
        inner.queue.push_back(decision);
    }
}

/// Integration metric: base 0.5, plus goal overlap, message-direction
/// balance (min/max ratio; balanced when idle), and stress/load proximity.
fn integration_metric(
    overlap: f32,
    to_strategic: usize,
    to_operational: usize,
    strategic_stress: f32,
    operational_load: f32,
) -> f32 {
    let balance = if to_strategic == 0 && to_operational == 0 {
        1.0
    } else {
        let min = to_strategic.min(to_operational) as f32;
        let max = to_strategic.max(to_operational) as f32;
        min / max
    };
    let proximity = 1.0 - (strategic_stress - operational_load).abs() / 2.0;
    (0.5 + 0.2 * overlap + 0.2 * balance + 0.1 * proximity).clamp(0.0, 1.0)
}

/// Load balancing between ticks: migrate a couple of queued operational
/// decisions to the strategic worker when loads diverge, and re-sort the
/// queue by effective priority when the strategic worker is saturated.
fn apply_load_balancing(
    queue: &mut VecDeque<Decision>,
    strategic_load: f32,
    operational_load: f32,
) {
    if operational_load > 0.8 && strategic_load < 0.6 {
        let mut migrated = 0usize;
        for decision in queue.iter_mut() {
            if migrated == MAX_MIGRATED_PER_TICK {
                break;
            }
            if matches!(
                decision.kind,
                DecisionKind::Operational | DecisionKind::RealTime
            ) && decision.route_override.is_none()
            {
                decision.route_override = Some(WorkerRole::Strategic);
                migrated += 1;
            }
        }
        if migrated > 0 {
            info!(
                target: "dyad::orchestrator",
                migrated,
                "migrated queued operational decisions to the strategic worker"
            );
        }
    }

    if strategic_load > 0.8 {
        let mut drained: Vec<Decision> = queue.drain(..).collect();
        // Stable sort keeps submission order among equal priorities.
        drained.sort_by(|a, b| {
            effective_priority(b)
                .partial_cmp(&effective_priority(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        queue.extend(drained);
    }
}

fn effective_priority(decision: &Decision) -> f32 {
    if decision.kind == DecisionKind::Ethical {
        decision.priority.max(1.0)
    } else {
        decision.priority
    }
}

fn truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_complex_query() {
        let long_question = format!("{}?", "x".repeat(120));
        assert_eq!(
            DecisionKind::classify(&long_question),
            DecisionKind::ComplexQuery
        );
        // Short questions are not complex.
        assert_eq!(DecisionKind::classify("why?"), DecisionKind::General);
    }

    #[test]
    fn test_classify_keywords_in_order() {
        assert_eq!(
            DecisionKind::classify("draft a plan for the quarter"),
            DecisionKind::Strategic
        );
        assert_eq!(
            DecisionKind::classify("should we ship this release"),
            DecisionKind::Ethical
        );
        assert_eq!(
            DecisionKind::classify("help me configure the cluster"),
            DecisionKind::Operational
        );
        assert_eq!(
            DecisionKind::classify("good morning"),
            DecisionKind::General
        );
        // "plan" outranks "help" because rules are tried in order.
        assert_eq!(
            DecisionKind::classify("help me plan a trip"),
            DecisionKind::Strategic
        );
    }

    #[test]
    fn test_truthy_variants() {
        assert!(truthy(Some(&serde_json::json!(true))));
        assert!(truthy(Some(&serde_json::json!("TRUE"))));
        assert!(truthy(Some(&serde_json::json!(1))));
        assert!(!truthy(Some(&serde_json::json!(false))));
        assert!(!truthy(Some(&serde_json::json!("yes"))));
        assert!(!truthy(Some(&serde_json::json!(0))));
        assert!(!truthy(None));
    }

    #[test]
    fn test_integration_metric_idle_is_balanced() {
        let idle = integration_metric(0.0, 0, 0, 0.3, 0.3);
        assert!((idle - 0.8).abs() < 1e-6);
        // One-sided message flow drops the balance component entirely.
        let skewed = integration_metric(0.0, 4, 0, 0.3, 0.3);
        assert!((skewed - 0.6).abs() < 1e-6);
        assert!(integration_metric(1.0, 1, 1, 0.0, 0.0) <= 1.0);
    }

    #[test]
    fn test_load_balancing_migrates_at_most_two() {
        let mut queue: VecDeque<Decision> = (0..4)
            .map(|i| {
                Decision::new(
                    DecisionKind::Operational,
                    format!("task {i}"),
                    serde_json::json!({}),
                )
            })
            .collect();
        apply_load_balancing(&mut queue, 0.2, 0.9);
        let migrated = queue
            .iter()
            .filter(|d| d.route_override == Some(WorkerRole::Strategic))
            .count();
        assert_eq!(migrated, 2);
        // First two in queue order were taken.
        assert!(queue[0].route_override.is_some());
        assert!(queue[1].route_override.is_some());
        assert!(queue[2].route_override.is_none());
    }

    #[test]
    fn test_load_balancing_requires_idle_strategic_worker() {
        let mut queue: VecDeque<Decision> = VecDeque::new();
        queue.push_back(Decision::new(
            DecisionKind::Operational,
            "task",
            serde_json::json!({}),
        ));
        apply_load_balancing(&mut queue, 0.7, 0.9);
        assert!(queue[0].route_override.is_none());
    }

    #[test]
    fn test_saturated_strategic_worker_resorts_queue() {
        let mut queue: VecDeque<Decision> = VecDeque::new();
        queue.push_back(Decision::new(
            DecisionKind::General,
            "later",
            serde_json::json!({}),
        ));
        queue.push_back(Decision::new(
            DecisionKind::Ethical,
            "should we",
            serde_json::json!({}),
        ));
        apply_load_balancing(&mut queue, 0.9, 0.1);
        // Ethical decisions float to the front at effective priority 1.0.
        assert_eq!(queue[0].kind, DecisionKind::Ethical);
    }

    #[test]
    fn test_effective_priority_ethical_floor() {
        let ethical = Decision::new(DecisionKind::Ethical, "x", serde_json::json!({}));
        assert_eq!(effective_priority(&ethical), 1.0);
        let general = Decision::new(DecisionKind::General, "x", serde_json::json!({}));
        assert_eq!(effective_priority(&general), 0.5);
    }
}
