//! Evaluation workspace core
//!
//! Holds the learner's per-language buffers, builds Run/Submit requests from
//! the problem's case lists, dispatches them to the execution service and
//! reconciles the responses into a display model. Rendering and the
//! execution sandbox live elsewhere.

pub mod aggregator;
pub mod cache;
pub mod code_store;
pub mod collaborator;
pub mod error;
pub mod orchestrator;
pub mod reconciler;
pub mod session;
pub mod snapshot;
pub mod templates;
#[cfg(test)]
mod testing;
pub mod workspace;

pub use aggregator::build_cases;
pub use cache::{BufferCache, MemoryCache, RedisCache};
pub use code_store::LanguageCodeStore;
pub use collaborator::{ExecutionCollaborator, HttpCollaborator};
pub use error::{CacheError, CollaboratorError, EvaluationError, SnapshotError};
pub use orchestrator::{EvaluationOrchestrator, EvaluationPhase, EvaluationReport};
pub use reconciler::{
    reconcile, CountDiscrepancy, EvaluationResult, EvaluationStatus, Metrics, PerCaseResult,
    TestResultsSummary,
};
pub use session::SessionContext;
pub use snapshot::render_assistant_snapshot;
pub use templates::{fallback_template, TemplateSource};
pub use workspace::{Delivery, EvaluationWorkspace};
