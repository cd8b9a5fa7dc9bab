//! The two logical decision workers.
//!
//! Both live inside one process and are driven sequentially by the
//! synchronization tick; there is no parallel execution between them. The
//! strategic worker handles long-horizon and ethical decisions through the
//! ethics collaborator; the operational worker owns the retrieval pipeline
//! and handles real-time requests, screening input through the privacy
//! collaborator first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::knowledge::retrieval::{RetrievalCoordinator, RetrievalOptions};
use crate::traits::{EthicsEvaluator, MemoryProvider, PrivacyGuard};

use super::{Decision, DecisionKind};

/// Which logical partition a decision or message is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Strategic,
    Operational,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Strategic => "strategic",
            WorkerRole::Operational => "operational",
        }
    }

    pub fn peer(&self) -> WorkerRole {
        match self {
            WorkerRole::Strategic => WorkerRole::Operational,
            WorkerRole::Operational => WorkerRole::Strategic,
        }
    }
}

/// Per-worker snapshot, recomputed once per tick by the tick owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerState {
    pub awareness: f32,
    pub coherence: f32,
    /// Stress for the strategic worker, load for the operational one.
    pub load: f32,
    pub active_goals: Vec<String>,
    pub focus: String,
}

impl WorkerState {
    fn new(goals: &[&str], focus: &str) -> Self {
        Self {
            awareness: 0.6,
            coherence: 0.8,
            load: 0.1,
            active_goals: goals.iter().map(|g| g.to_string()).collect(),
            focus: focus.to_string(),
        }
    }
}

/// One worker's verdict on a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerVerdict {
    pub action: String,
    pub confidence: f32,
    pub efficiency: f32,
    pub reasoning: String,
}

/// A message queued for delivery to the other worker on the next tick.
#[derive(Debug, Clone)]
pub struct InterWorkerMessage {
    pub target: WorkerRole,
    pub content: String,
}

/// Ceiling on a worker's retained inbox.
const INBOX_CAP: usize = 32;

// ---------------------------------------------------------------------------
// Strategic worker
// ---------------------------------------------------------------------------

/// Long-horizon planning and ethics arbitration partition.
pub struct StrategicWorker {
    pub state: WorkerState,
    pub inbox: Vec<String>,
    ethics: Arc<dyn EthicsEvaluator>,
    processed_recently: u32,
}

impl StrategicWorker {
    pub fn new(ethics: Arc<dyn EthicsEvaluator>) -> Self {
        Self {
            state: WorkerState::new(
                &["long_term_alignment", "risk_oversight", "knowledge_freshness"],
                "strategy",
            ),
            inbox: Vec::new(),
            ethics,
            processed_recently: 0,
        }
    }

    pub async fn process(&mut self, decision: &Decision) -> WorkerVerdict {
        self.processed_recently += 1;
        let input_lower = decision.input.to_lowercase();

        if decision.kind == DecisionKind::Ethical {
            let verdict = self.ethics.evaluate(&decision.input, &decision.context).await;
            if !verdict.approved {
                return WorkerVerdict {
                    action: "ethically_rejected".into(),
                    confidence: (0.6 + 0.4 * verdict.overall_score).clamp(0.0, 1.0),
                    efficiency: 0.6,
                    reasoning: format!(
                        "Ethics review rejected the action: {}",
                        verdict.violations.join("; ")
                    ),
                };
            }
            return WorkerVerdict {
                action: "approve".into(),
                confidence: (0.6 + 0.4 * verdict.overall_score).clamp(0.0, 1.0),
                efficiency: 0.6,
                reasoning: format!(
                    "Ethics review approved with score {:.2}",
                    verdict.overall_score
                ),
            };
        }

        let mut confidence = 0.75f32;
        if input_lower.contains("plan") || input_lower.contains("strategy") {
            confidence += 0.1;
        }
        if decision.priority >= 1.0 {
            confidence += 0.05;
        }
        WorkerVerdict {
            action: "strategic_plan".into(),
            confidence: confidence.min(0.95),
            efficiency: 0.6,
            reasoning: format!(
                "Strategic assessment of \"{}\" against {} active goals",
                truncate(&decision.input, 80),
                self.state.active_goals.len()
            ),
        }
    }

    /// Recomputes the state snapshot for this tick (single writer).
    pub fn refresh_state(&mut self, queue_depth: usize) {
        let stress = 0.1 + 0.06 * self.processed_recently as f32 + 0.04 * queue_depth as f32;
        self.state.load = stress.clamp(0.0, 1.0);
        self.state.awareness = (0.55 + 0.05 * self.state.active_goals.len() as f32).clamp(0.0, 1.0);
        self.state.coherence = (1.0 - 0.3 * self.state.load).clamp(0.0, 1.0);
        // Recent-work pressure decays between ticks.
        self.processed_recently /= 2;
    }

    pub fn deliver(&mut self, content: String) {
        self.inbox.push(content);
        if self.inbox.len() > INBOX_CAP {
            let drop = self.inbox.len() - INBOX_CAP;
            self.inbox.drain(..drop);
        }
    }

    pub fn healthy(&self) -> bool {
        self.state.load < 0.95
    }
}

// ---------------------------------------------------------------------------
// Operational worker
// ---------------------------------------------------------------------------

/// Real-time / retrieval partition. Owns the retrieval coordinator.
pub struct OperationalWorker {
    pub state: WorkerState,
    pub inbox: Vec<String>,
    retrieval: Arc<RetrievalCoordinator>,
    memory: Arc<dyn MemoryProvider>,
    privacy: Arc<dyn PrivacyGuard>,
    processed_recently: u32,
}

impl OperationalWorker {
    pub fn new(
        retrieval: Arc<RetrievalCoordinator>,
        memory: Arc<dyn MemoryProvider>,
        privacy: Arc<dyn PrivacyGuard>,
    ) -> Self {
        Self {
            state: WorkerState::new(
                &["fast_response", "knowledge_freshness"],
                "real_time",
            ),
            inbox: Vec::new(),
            retrieval,
            memory,
            privacy,
            processed_recently: 0,
        }
    }

    pub fn retrieval(&self) -> &Arc<RetrievalCoordinator> {
        &self.retrieval
    }

    pub async fn process(&mut self, decision: &Decision) -> WorkerVerdict {
        self.processed_recently += 1;

        // Privacy screen first. An unavailable guard is treated as unknown
        // and processing proceeds (fail-open); only an explicit denial blocks.
        match self.privacy.evaluate(&decision.input).await {
            Ok(verdict) if !verdict.allowed => {
                return WorkerVerdict {
                    action: "privacy_blocked".into(),
                    confidence: 0.9,
                    efficiency: 0.9,
                    reasoning: "Privacy screening disallowed this input".into(),
                };
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    target: "dyad::worker",
                    error = %e,
                    "privacy guard unavailable, proceeding fail-open"
                );
            }
        }

        let memory_context = self.memory.relevant_memories(&decision.input, 2).await;
        let mut reasoning = format!(
            "Operational handling of \"{}\"",
            truncate(&decision.input, 80)
        );
        if !memory_context.is_empty() {
            reasoning.push_str(&format!(", seeded with {} memory snippets", memory_context.len()));
        }

        if decision.input.trim().len() > 10 {
            let options = RetrievalOptions {
                memory_context,
                ..Default::default()
            };
            match self.retrieval.run_retrieval(&decision.input, &options).await {
                Ok(results) => {
                    if let Some(top) = results.first() {
                        if top.artifact.provenance_score > 0.5 {
                            let domain = top.artifact.metadata["domain"]
                                .as_str()
                                .unwrap_or("unknown source");
                            reasoning.push_str(&format!(
                                "; grounded in retrieved knowledge from {} (provenance {:.2})",
                                domain, top.artifact.provenance_score
                            ));
                        } else {
                            reasoning.push_str(&format!(
                                "; {} retrieval results available, none high-provenance",
                                results.len()
                            ));
                        }
                    }
                }
                Err(e) => {
                    debug!(target: "dyad::worker", error = %e, "retrieval unavailable for decision");
                }
            }
        }

        let input_lower = decision.input.to_lowercase();
        let mut confidence = 0.7f32;
        if ["what", "how", "explain"]
            .iter()
            .any(|kw| input_lower.contains(kw))
        {
            confidence += 0.15;
        }
        WorkerVerdict {
            action: "respond".into(),
            confidence: confidence.min(0.95),
            efficiency: 0.8,
            reasoning,
        }
    }

    /// Recomputes the state snapshot for this tick (single writer).
    pub fn refresh_state(&mut self, queue_depth: usize) {
        let load = 0.1 + 0.08 * self.processed_recently as f32 + 0.05 * queue_depth as f32;
        self.state.load = load.clamp(0.0, 1.0);
        self.state.awareness =
            (0.5 + 0.02 * self.retrieval.compiler().artifact_count().min(20) as f32)
                .clamp(0.0, 1.0);
        self.state.coherence = (1.0 - 0.3 * self.state.load).clamp(0.0, 1.0);
        self.processed_recently /= 2;
    }

    pub fn deliver(&mut self, content: String) {
        self.inbox.push(content);
        if self.inbox.len() > INBOX_CAP {
            let drop = self.inbox.len() - INBOX_CAP;
            self.inbox.drain(..drop);
        }
    }

    pub fn healthy(&self) -> bool {
        self.state.load < 0.95
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut s: String = text.chars().take(max).collect();
        s.push('…');
        s
    }
}

/// Jaccard overlap between the two workers' goal lists.
pub fn goal_overlap(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.iter().filter(|g| b.contains(g)).count();
    let union = a.len() + b.len() - shared;
    if union == 0 {
        0.0
    } else {
        shared as f32 / union as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_overlap_shared_goal() {
        let a = vec!["alignment".to_string(), "freshness".to_string()];
        let b = vec!["freshness".to_string(), "speed".to_string()];
        let overlap = goal_overlap(&a, &b);
        assert!((overlap - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(goal_overlap(&[], &[]), 0.0);
    }

    #[test]
    fn test_role_peer() {
        assert_eq!(WorkerRole::Strategic.peer(), WorkerRole::Operational);
        assert_eq!(WorkerRole::Operational.peer(), WorkerRole::Strategic);
    }

    #[test]
    fn test_truncate_preserves_short_input() {
        assert_eq!(truncate("short", 10), "short");
        assert!(truncate(&"x".repeat(100), 10).ends_with('…'));
    }
}
