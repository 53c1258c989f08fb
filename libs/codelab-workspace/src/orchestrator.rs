//! Evaluation Orchestrator - Run/Submit State Machine
//!
//! **States:**
//! - Run:    Idle -> Running    -> (Completed | Errored) -> Idle
//! - Submit: Idle -> Submitting -> (Completed | Errored) -> Idle
//!
//! **Single-flight:**
//! At most one evaluation is in flight per orchestrator (one per session).
//! A second Run or Submit is rejected with `EvaluationError::Busy`, never
//! queued, so two result sets cannot race into the same display model.
//!
//! **Failure handling:**
//! Transport, status and payload failures become an `Errored` result with a
//! generic message. Nothing above this layer sees a collaborator error.
//! There is no automatic retry.

use crate::aggregator::{build_cases, partition};
use crate::collaborator::ExecutionCollaborator;
use crate::error::{CollaboratorError, EvaluationError};
use crate::reconciler::{reconcile, EvaluationResult, EvaluationStatus};
use crate::session::SessionContext;
use codelab_common::types::{
    normalize_language, CustomTestCase, EvaluationMode, ExecutionResponse, Problem,
    RunCodeRequest, SubmitSolutionRequest,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationPhase {
    Idle,
    Running,
    Submitting,
    Completed,
    Errored,
}

/// Outcome of one Run/Submit, tagged with the session that issued it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub session_id: Uuid,
    pub mode: EvaluationMode,
    pub language: String,
    pub case_count: usize,
    pub result: EvaluationResult,
}

pub struct EvaluationOrchestrator {
    collaborator: Arc<dyn ExecutionCollaborator>,
    phase: Arc<Mutex<EvaluationPhase>>,
}

/// Holds the in-flight slot; dropping it always returns the machine to Idle
struct PhaseGuard {
    phase: Arc<Mutex<EvaluationPhase>>,
}

impl PhaseGuard {
    fn settle(&self, terminal: EvaluationPhase) {
        *self.phase.lock() = terminal;
        debug!(phase = ?terminal, "Evaluation reached terminal state");
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        *self.phase.lock() = EvaluationPhase::Idle;
    }
}

impl EvaluationOrchestrator {
    pub fn new(collaborator: Arc<dyn ExecutionCollaborator>) -> Self {
        Self {
            collaborator,
            phase: Arc::new(Mutex::new(EvaluationPhase::Idle)),
        }
    }

    pub fn phase(&self) -> EvaluationPhase {
        *self.phase.lock()
    }

    fn begin(&self, mode: EvaluationMode) -> Result<PhaseGuard, EvaluationError> {
        let mut phase = self.phase.lock();
        if *phase != EvaluationPhase::Idle {
            return Err(EvaluationError::Busy { active: *phase });
        }
        *phase = match mode {
            EvaluationMode::Run => EvaluationPhase::Running,
            EvaluationMode::Submit => EvaluationPhase::Submitting,
        };
        Ok(PhaseGuard {
            phase: Arc::clone(&self.phase),
        })
    }

    /// Run `code` against the basic cases plus the learner's custom cases
    #[instrument(skip_all, fields(session_id = %session.session_id(), problem_id = %problem.id, language = %language))]
    pub async fn run(
        &self,
        session: &SessionContext,
        problem: &Problem,
        code: &str,
        language: &str,
        custom_cases: &[CustomTestCase],
    ) -> Result<EvaluationReport, EvaluationError> {
        validate_source(code)?;
        let guard = self.begin(EvaluationMode::Run)?;

        let language = normalize_language(language);
        let (basic, custom) = partition(build_cases(EvaluationMode::Run, problem, custom_cases));
        let case_count = basic.len() + custom.len();
        let request = RunCodeRequest {
            code: code.to_string(),
            language: language.clone(),
            test_cases: basic,
            test_cases_custom: custom,
            problem_title: problem.title.clone(),
        };

        info!(cases = case_count, "Dispatching run");
        let start = Instant::now();
        let outcome = self.collaborator.run_code(&request).await;
        let result = settle(&guard, outcome, EvaluationMode::Run, start);

        Ok(EvaluationReport {
            session_id: session.session_id(),
            mode: EvaluationMode::Run,
            language,
            case_count,
            result,
        })
    }

    /// Submit `code` against the full graded suite (basic + advanced)
    #[instrument(skip_all, fields(session_id = %session.session_id(), problem_id = %problem.id, language = %language))]
    pub async fn submit(
        &self,
        session: &SessionContext,
        problem: &Problem,
        code: &str,
        language: &str,
    ) -> Result<EvaluationReport, EvaluationError> {
        validate_source(code)?;
        let guard = self.begin(EvaluationMode::Submit)?;

        let language = normalize_language(language);
        let (basic, advanced) = partition(build_cases(EvaluationMode::Submit, problem, &[]));
        let case_count = basic.len() + advanced.len();
        let request = SubmitSolutionRequest {
            code: code.to_string(),
            language: language.clone(),
            question_id: problem.id.clone(),
            test_cases_basic: basic,
            test_cases_advanced: advanced,
        };

        info!(cases = case_count, "Dispatching submission");
        let start = Instant::now();
        let outcome = self.collaborator.submit_solution(&request).await;
        let result = settle(&guard, outcome, EvaluationMode::Submit, start);

        Ok(EvaluationReport {
            session_id: session.session_id(),
            mode: EvaluationMode::Submit,
            language,
            case_count,
            result,
        })
    }
}

fn validate_source(code: &str) -> Result<(), EvaluationError> {
    if code.trim().is_empty() {
        return Err(EvaluationError::EmptySource);
    }
    Ok(())
}

fn settle(
    guard: &PhaseGuard,
    outcome: Result<ExecutionResponse, CollaboratorError>,
    mode: EvaluationMode,
    start: Instant,
) -> EvaluationResult {
    let result = match outcome {
        Ok(response) => reconcile(response),
        Err(e) => {
            error!(mode = %mode, error = %e, "Execution service call failed");
            EvaluationResult::transport_failure()
        }
    };

    guard.settle(match result.status {
        EvaluationStatus::Completed => EvaluationPhase::Completed,
        EvaluationStatus::Errored => EvaluationPhase::Errored,
    });

    info!(
        mode = %mode,
        status = ?result.status,
        score = ?result.score_line(),
        round_trip_ms = start.elapsed().as_millis() as u64,
        "Evaluation finished"
    );
    result
}
