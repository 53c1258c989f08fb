use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::render_metrics))
        .route("/workspaces", post(handlers::create_workspace))
        .route("/workspaces/:id", delete(handlers::delete_workspace))
        .route("/workspaces/:id/problem", put(handlers::open_problem))
        .route(
            "/workspaces/:id/code",
            get(handlers::get_code).put(handlers::put_code),
        )
        .route("/workspaces/:id/language", post(handlers::switch_language))
        .route("/workspaces/:id/custom-cases", post(handlers::add_custom_case))
        .route(
            "/workspaces/:id/custom-cases/:case_id",
            delete(handlers::remove_custom_case),
        )
        .route("/workspaces/:id/run", post(handlers::run))
        .route("/workspaces/:id/submit", post(handlers::submit))
        .route("/workspaces/:id/results", get(handlers::results))
        .route("/workspaces/:id/snapshot", get(handlers::snapshot))
}
