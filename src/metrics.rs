// Prometheus metrics definitions for the snake arena.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Currently running games (0 or 1).
    pub static ref ACTIVE_GAMES: IntGauge =
        IntGauge::new("snake_arena_active_games", "Currently running games").unwrap();

    /// Live spectator WebSocket connections.
    pub static ref CONNECTED_WEBSOCKETS: IntGauge =
        IntGauge::new("snake_arena_connected_websockets", "Live spectator WebSocket connections").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total ticks resolved.
    pub static ref TICKS_TOTAL: IntCounter =
        IntCounter::new("snake_arena_ticks_total", "Total ticks resolved").unwrap();

    /// Total decisions received from agents and applied.
    pub static ref AGENT_DECISIONS_TOTAL: IntCounter =
        IntCounter::new("snake_arena_agent_decisions_total", "Agent decisions applied").unwrap();

    /// Moves forfeited, by reason (timeout, transport, status, protocol).
    pub static ref AGENT_FORFEITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snake_arena_agent_forfeits_total", "Moves forfeited by agents"),
        &["reason"],
    )
    .unwrap();

    /// Snake deaths, by cause (bounds, self, snake).
    pub static ref SNAKE_DEATHS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snake_arena_snake_deaths_total", "Snake deaths"),
        &["cause"],
    )
    .unwrap();

    /// Apples eaten.
    pub static ref APPLES_EATEN_TOTAL: IntCounter =
        IntCounter::new("snake_arena_apples_eaten_total", "Apples eaten").unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Per-tick processing time in milliseconds, decision gathering included.
    pub static ref GAME_TICK_DURATION_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("snake_arena_tick_duration_ms", "Per-tick processing time in ms")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0]),
    )
    .unwrap();

    /// Single agent decision round trip in milliseconds.
    pub static ref DECISION_LATENCY_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("snake_arena_decision_latency_ms", "Agent decision latency in ms")
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_GAMES.clone()),
        Box::new(CONNECTED_WEBSOCKETS.clone()),
        Box::new(TICKS_TOTAL.clone()),
        Box::new(AGENT_DECISIONS_TOTAL.clone()),
        Box::new(AGENT_FORFEITS_TOTAL.clone()),
        Box::new(SNAKE_DEATHS_TOTAL.clone()),
        Box::new(APPLES_EATEN_TOTAL.clone()),
        Box::new(GAME_TICK_DURATION_MS.clone()),
        Box::new(DECISION_LATENCY_MS.clone()),
    ];

    for c in collectors {
        // Re-registration (tests, repeated startup) is harmless.
        if let Err(e) = REGISTRY.register(c) {
            tracing::debug!("metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
