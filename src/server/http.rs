use crate::app::dto::*;
use crate::app::engine::AnalysisEngine;
use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct HttpState {
    pub engine: AnalysisEngine,
}

#[derive(Debug, Clone, serde::Serialize)]
struct ApiErrorBody {
    error: String,
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> impl IntoResponse {
    (status, Json(ApiErrorBody { error: msg.into() }))
}

pub fn build_router(engine: AnalysisEngine) -> Router {
    let state = Arc::new(HttpState { engine });

    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/scenarios", get(scenarios))
        .route("/workflows", get(workflows))
        .route("/contracts", get(contracts))
        .route("/diagnostics", get(diagnostics))
        .route("/reload", post(reload))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(engine: AnalysisEngine, addr: SocketAddr) -> Result<()> {
    let app = build_router(engine);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs `f` on the blocking pool; engine errors map to `error_status`.
async fn run_blocking<T, F>(f: F, error_status: StatusCode) -> axum::response::Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match spawn_blocking(f).await {
        Ok(Ok(res)) => Json(res).into_response(),
        Ok(Err(e)) => api_error(error_status, format!("{e:#}")).into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task join error: {e}"),
        )
        .into_response(),
    }
}

async fn health(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    match state.engine.health() {
        Ok(res) => Json(res).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn reload(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let engine = state.engine.clone();
    run_blocking(move || engine.reload(), StatusCode::INTERNAL_SERVER_ERROR).await
}

async fn analyze(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    run_blocking(move || engine.analyze(req), StatusCode::BAD_REQUEST).await
}

async fn scenarios(
    State(state): State<Arc<HttpState>>,
    Query(q): Query<ScenarioQuery>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    run_blocking(move || engine.scenarios(q), StatusCode::BAD_REQUEST).await
}

async fn workflows(
    State(state): State<Arc<HttpState>>,
    Query(q): Query<WorkflowQuery>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    run_blocking(move || engine.workflows(q), StatusCode::BAD_REQUEST).await
}

async fn contracts(
    State(state): State<Arc<HttpState>>,
    Query(q): Query<ContractQuery>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    run_blocking(move || engine.contracts(q), StatusCode::BAD_REQUEST).await
}

async fn diagnostics(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let engine = state.engine.clone();
    run_blocking(move || engine.diagnostics(), StatusCode::INTERNAL_SERVER_ERROR).await
}
