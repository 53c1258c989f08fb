// HTTP route handlers for the Codelab workspace API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use codelab_common::types::{CaseValue, CustomTestCase, EvaluationMode, Problem};
use codelab_workspace::{Delivery, EvaluationError, EvaluationWorkspace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::metrics;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateWorkspaceRequest {
    /// Stable learner id; drafts persisted under it survive a new workspace
    #[serde(default)]
    pub learner_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateWorkspaceResponse {
    pub workspace_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OpenProblemRequest {
    pub problem: Problem,
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub topic_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SwitchLanguageRequest {
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomCaseRequest {
    #[serde(default)]
    pub input: CaseValue,
    #[serde(default, alias = "output")]
    pub expected_output: CaseValue,
    #[serde(default)]
    pub weight: Option<u32>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn rejection(err: &EvaluationError) -> Response {
    let (status, reason) = match err {
        EvaluationError::EmptySource => (StatusCode::UNPROCESSABLE_ENTITY, "empty_source"),
        EvaluationError::Busy { .. } => (StatusCode::CONFLICT, "busy"),
        EvaluationError::NoProblem => (StatusCode::CONFLICT, "no_problem"),
    };
    metrics::REJECTED_EVALUATIONS_TOTAL
        .with_label_values(&[reason])
        .inc();
    error_response(status, err.to_string())
}

fn lookup(state: &AppState, id: Uuid) -> Result<Arc<EvaluationWorkspace>, Response> {
    state
        .workspaces
        .read()
        .get(&id)
        .cloned()
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Workspace not found"))
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn render_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

/// POST /workspaces - Create a workspace for one learner
pub async fn create_workspace(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<CreateWorkspaceRequest>>,
) -> impl IntoResponse {
    let workspace_id = Uuid::new_v4();
    let owner = payload
        .and_then(|Json(request)| request.learner_id)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| workspace_id.to_string());
    let workspace = Arc::new(
        EvaluationWorkspace::new(Arc::clone(&state.collaborator), Arc::clone(&state.cache))
            .with_owner(owner),
    );
    state
        .workspaces
        .write()
        .insert(workspace_id, Arc::clone(&workspace));

    // Templates are best-effort; the workspace starts on fallbacks
    let templates = Arc::clone(&state.templates);
    tokio::spawn(async move {
        workspace.refresh_templates(templates.as_ref()).await;
    });

    info!(workspace_id = %workspace_id, "Workspace created");
    (StatusCode::CREATED, Json(CreateWorkspaceResponse { workspace_id }))
}

/// DELETE /workspaces/{id} - Persist drafts and drop the workspace
pub async fn delete_workspace(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let Some(workspace) = state.workspaces.write().remove(&id) else {
        return error_response(StatusCode::NOT_FOUND, "Workspace not found");
    };
    // NoProblem just means there is nothing to save
    let _ = workspace.persist().await;
    info!(workspace_id = %id, "Workspace closed");
    StatusCode::NO_CONTENT.into_response()
}

/// PUT /workspaces/{id}/problem - Open a problem (new problem => new session)
pub async fn open_problem(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OpenProblemRequest>,
) -> Response {
    let workspace = match lookup(&state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };
    let session = workspace
        .open_problem(payload.problem, payload.course_id, payload.topic_id)
        .await;
    (StatusCode::OK, Json(session)).into_response()
}

/// GET /workspaces/{id}/code - Active language and buffer
pub async fn get_code(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let workspace = match lookup(&state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };
    match (workspace.active_language(), workspace.active_code()) {
        (Some(language), Ok(code)) => Json(CodeResponse { language, code }).into_response(),
        (_, Err(e)) => rejection(&e),
        (None, Ok(_)) => rejection(&EvaluationError::NoProblem),
    }
}

/// PUT /workspaces/{id}/code - Replace the active buffer
pub async fn put_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EditRequest>,
) -> Response {
    let workspace = match lookup(&state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };
    if let Err(e) = workspace.edit(payload.code) {
        return rejection(&e);
    }
    if let Err(e) = workspace.persist().await {
        return rejection(&e);
    }
    StatusCode::NO_CONTENT.into_response()
}

/// POST /workspaces/{id}/language - Switch language without losing the current buffer
pub async fn switch_language(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SwitchLanguageRequest>,
) -> Response {
    let workspace = match lookup(&state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };
    match workspace.switch_language(&payload.language).await {
        Ok(code) => Json(CodeResponse {
            language: workspace.active_language().unwrap_or(payload.language),
            code,
        })
        .into_response(),
        Err(e) => rejection(&e),
    }
}

/// POST /workspaces/{id}/custom-cases - Add a learner-authored case
pub async fn add_custom_case(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CustomCaseRequest>,
) -> Response {
    let workspace = match lookup(&state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };
    let mut case = CustomTestCase::new(payload.input, payload.expected_output);
    case.weight = payload.weight;
    match workspace.add_custom_case(case) {
        Ok(case_id) => (StatusCode::CREATED, Json(serde_json::json!({ "id": case_id }))).into_response(),
        Err(e) => rejection(&e),
    }
}

/// DELETE /workspaces/{id}/custom-cases/{case_id}
pub async fn remove_custom_case(
    State(state): State<Arc<AppState>>,
    Path((id, case_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let workspace = match lookup(&state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };
    if workspace.remove_custom_case(case_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "Custom case not found")
    }
}

/// POST /workspaces/{id}/run - Run against sample + custom cases
pub async fn run(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    evaluate(&state, id, EvaluationMode::Run).await
}

/// POST /workspaces/{id}/submit - Submit against the graded suite
pub async fn submit(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    evaluate(&state, id, EvaluationMode::Submit).await
}

async fn evaluate(state: &AppState, id: Uuid, mode: EvaluationMode) -> Response {
    let workspace = match lookup(state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };

    let outcome = match mode {
        EvaluationMode::Run => workspace.run().await,
        EvaluationMode::Submit => workspace.submit().await,
    };

    match outcome {
        Ok(Delivery::Applied(report)) => {
            let status = if report.result.is_completed() { "completed" } else { "errored" };
            metrics::EVALUATIONS_TOTAL
                .with_label_values(&[&mode.to_string(), status])
                .inc();
            if !report.result.is_completed() {
                error!(workspace_id = %id, mode = %mode, "Evaluation errored");
            }
            (StatusCode::OK, Json(Delivery::Applied(report))).into_response()
        }
        Ok(delivery @ Delivery::Discarded { .. }) => {
            // Not an error: the learner moved on, the result is just dropped
            metrics::STALE_RESPONSES_TOTAL.inc();
            (StatusCode::OK, Json(delivery)).into_response()
        }
        Err(e) => rejection(&e),
    }
}

/// GET /workspaces/{id}/results - Latest Run and Submit reports
pub async fn results(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let workspace = match lookup(&state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };
    Json(serde_json::json!({
        "run": workspace.latest(EvaluationMode::Run),
        "submit": workspace.latest(EvaluationMode::Submit),
        "phase": workspace.phase(),
    }))
    .into_response()
}

/// GET /workspaces/{id}/snapshot - Plain-text context for the AI assistant
pub async fn snapshot(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let workspace = match lookup(&state, id) {
        Ok(ws) => ws,
        Err(response) => return response,
    };
    match workspace.assistant_snapshot() {
        Ok(Some(text)) => ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response(),
        Ok(None) => rejection(&EvaluationError::NoProblem),
        Err(e) => {
            error!(workspace_id = %id, error = %e, "Failed to render snapshot");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render snapshot")
        }
    }
}
