// ABOUTME: HTTP API layer for Crowbox providing the compile endpoints and routing
// ABOUTME: Integration layer between the axum server and the sandbox engine

use axum::{routing::post, Router};
use crowbox_sandbox::SandboxManager;
use std::sync::Arc;

pub mod compile_handlers;
pub mod response;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SandboxManager>,
}

/// Creates the compile API router
pub fn create_compile_router() -> Router<AppState> {
    Router::new()
        .route("/py", post(compile_handlers::compile))
        .route("/py/stop", post(compile_handlers::stop))
        .route("/teams/{team_id}/port", post(compile_handlers::register_port))
        .route("/sweep", post(compile_handlers::sweep))
}

/// Full application router mounted under `/api/compile`
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/compile", create_compile_router())
        .with_state(state)
}
