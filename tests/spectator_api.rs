// Spectator router checks, driven with tower's oneshot.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use snake_arena::agent::{Agent, GreedyAgent};
use snake_arena::api;
use snake_arena::engine::game::{Game, GameSettings};
use snake_arena::engine::grid::Field;
use snake_arena::engine::server::GameServer;
use snake_arena::metrics;

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn game(ticks: u64) -> Game {
    let agents: Vec<Arc<dyn Agent>> = vec![Arc::new(GreedyAgent), Arc::new(GreedyAgent)];
    Game::new(
        Field::new(6, 8),
        agents,
        GameSettings {
            ticks,
            ..GameSettings::default()
        },
    )
    .unwrap()
}

#[tokio::test]
async fn health_reports_service() {
    let app = api::router(Arc::new(GameServer::new()));
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["service"], "snake-arena");
}

#[tokio::test]
async fn field_is_missing_before_first_game() {
    let server = Arc::new(GameServer::new());
    let (status, body) = get(api::router(server.clone()), "/api/game/field").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("error"));

    let (status, body) = get(api::router(server), "/api/game/status").await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["running"], false);
    assert_eq!(v["tick"], 0);
    assert!(v["start_time"].is_null());
}

#[tokio::test]
async fn field_and_status_follow_the_game() {
    let server = Arc::new(GameServer::new());
    server
        .run(game(4), Duration::ZERO, |_, _| {})
        .await
        .unwrap();

    let (status, body) = get(api::router(server.clone()), "/api/game/field").await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["type"], "snapshot");
    assert_eq!(v["tick"], 4);
    assert_eq!(v["field"]["height"], 6);
    assert_eq!(v["snakes"].as_array().unwrap().len(), 2);
    assert_eq!(v["rows"].as_array().unwrap().len(), 6);

    let (_, body) = get(api::router(server), "/api/game/status").await;
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["running"], false);
    assert_eq!(v["tick"], 4);
    assert_eq!(v["ticks_remaining"], 0);
    assert!(v["start_time"].is_string());
}

#[tokio::test]
async fn stop_without_game_is_rejected() {
    let app = api::router(Arc::new(GameServer::new()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/game/stop")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_are_exposed() {
    metrics::register_metrics();
    metrics::TICKS_TOTAL.inc();
    let (status, body) = get(api::router(Arc::new(GameServer::new())), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("snake_arena_ticks_total"));
}
