//! dyad-core: dual-worker decision engine (orchestrator, knowledge
//! retrieval pipeline, in-memory vector search).
//!
//! Re-exports the public surface from one place so embedders depend on a
//! consistent API regardless of internal module layout.

pub mod config;
pub mod error;
pub mod knowledge;
pub mod orchestrator;
pub mod traits;

// Configuration and errors
pub use config::EngineConfig;
pub use error::{CoreError, CoreResult};

// Orchestrator surface
pub use orchestrator::{
    arbitrate, ArbitrationMode, ArbitrationOutcome, Collaborators, ComponentHealth, Decision,
    DecisionKind, DecisionResult, EngineState, EngineStatus, HealthReport, InterWorkerMessage,
    OperationalWorker, Orchestrator, StrategicWorker, WorkerRole, WorkerState, WorkerVerdict,
};

// Knowledge pipeline
pub use knowledge::compiler::{
    CompileOptions, HttpFetcher, KnowledgeCompiler, PageFetcher,
};
pub use knowledge::embedding::{Embedder, HashEmbedder};
pub use knowledge::retrieval::{RankedArtifact, RetrievalCoordinator, RetrievalOptions};
pub use knowledge::vector_store::{cosine_similarity, SearchHit, VectorStore};
pub use knowledge::{Artifact, FeedbackEntry, RetrievalPattern};

// Collaborator seams
pub use traits::{
    EthicsEvaluator, EthicalVerdict, MemoryProvider, MemorySnippet, NullEthics, NullMemory,
    NullPrivacy, NullSelfModel, PrivacyGuard, PrivacyVerdict, SelfModel,
};
