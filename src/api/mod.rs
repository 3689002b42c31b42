// Spectator HTTP API: health, metrics, game status and the live field.

pub mod ws;

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::engine::server::GameServer;
use crate::metrics;

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub game_server: Arc<GameServer>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(game_server: Arc<GameServer>) -> Router {
    let state = AppState { game_server };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Game
        .route("/api/game/status", get(game_status))
        .route("/api/game/field", get(game_field))
        .route("/api/game/stop", post(stop_game))
        // WebSocket
        .route("/ws/game", get(ws::ws_game))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "snake-arena" }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Game handlers ────────────────────────────────────────────────────

async fn game_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!(state.game_server.status())))
}

async fn game_field(State(state): State<AppState>) -> impl IntoResponse {
    match state.game_server.snapshot_json() {
        Some(snapshot) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            snapshot,
        )
            .into_response(),
        None => json_error(StatusCode::NOT_FOUND, "No game has started yet").into_response(),
    }
}

async fn stop_game(State(state): State<AppState>) -> impl IntoResponse {
    if !state.game_server.is_running() {
        return json_error(StatusCode::BAD_REQUEST, "No game is running").into_response();
    }
    state.game_server.stop_game();
    tracing::info!("Stop requested via API");
    (StatusCode::OK, Json(json!({ "status": "stopping" }))).into_response()
}
