use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use labelwatch_common::protocol::{
    EvaluateBlockRequest, EvaluateResponse, EvaluateTxRequest, InitializeRequest,
};
use labelwatch_engine::Agent;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
}

pub fn build_router(agent: Arc<Agent>) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/initialize", post(initialize))
        .route("/evaluate-block", post(evaluate_block))
        .route("/evaluate-tx", post(evaluate_tx))
        .with_state(AppState { agent })
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

async fn initialize(
    State(state): State<AppState>,
    Json(_req): Json<InitializeRequest>,
) -> Json<EvaluateResponse> {
    Json(state.agent.initialize().await)
}

async fn evaluate_block(
    State(state): State<AppState>,
    Json(req): Json<EvaluateBlockRequest>,
) -> Json<EvaluateResponse> {
    Json(state.agent.evaluate_block(&req.event).await)
}

async fn evaluate_tx(
    State(state): State<AppState>,
    Json(req): Json<EvaluateTxRequest>,
) -> Json<EvaluateResponse> {
    Json(state.agent.evaluate_tx(&req.event).await)
}
