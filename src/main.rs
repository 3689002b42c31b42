use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use snake_arena::agent::{Agent, GreedyAgent, HttpAgent};
use snake_arena::api;
use snake_arena::config::Config;
use snake_arena::engine::game::Game;
use snake_arena::engine::server::GameServer;
use snake_arena::metrics;

fn build_agents(config: &Config) -> anyhow::Result<Vec<Arc<dyn Agent>>> {
    let timeout = Duration::from_millis(config.decision_timeout_ms);
    (0..config.players)
        .map(|i| -> anyhow::Result<Arc<dyn Agent>> {
            if config.local_mode {
                return Ok(Arc::new(GreedyAgent));
            }
            let port = config.agent_port(i);
            let agent = HttpAgent::for_port(&config.hostname, port, timeout)
                .with_context(|| format!("agent for snake {i}"))?;
            tracing::info!(snake_id = i, address = agent.address(), "Agent bound");
            Ok(Arc::new(agent))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().context("failed to load configuration")?;
    metrics::register_metrics();
    tracing::info!(?config, "Configuration loaded");

    let agents = build_agents(&config)?;
    let game = Game::new(config.field(), agents, config.game_settings())
        .context("failed to set up the game")?;

    let game_server = Arc::new(GameServer::new());

    if let Some(port) = config.spectator_port {
        let app = api::router(game_server.clone());
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind spectator port {port}"))?;
        tracing::info!("Spectator API listening on port {port}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Spectator API stopped: {e}");
            }
        });
    }

    println!("Welcome to Snake Game!");
    println!("{}", game.render());

    let summary = game_server
        .run(
            game,
            Duration::from_millis(config.tick_interval_ms),
            |report, game| {
                println!("Ticks remained: {}", game.ticks_remaining());
                println!("{}", game.render());
                for forfeit in &report.forfeits {
                    println!("Snake {} missed its move: {}", forfeit.snake_id, forfeit.reason);
                }
            },
        )
        .await
        .context("game aborted")?;

    println!("Snake Game is over!");
    for snake in &summary.snakes {
        tracing::info!(
            snake_id = %snake.id,
            agent = %snake.agent,
            length = snake.length,
            apples = snake.stats.apples_eaten,
            deaths = snake.stats.deaths,
            forfeits = snake.stats.forfeits,
            "Final standing"
        );
    }
    Ok(())
}
