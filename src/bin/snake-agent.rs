// Reference agent: answers decision requests with the greedy strategy.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use snake_arena::agent::strategy::agent_router;

const DEFAULT_PORT: u16 = 8000;

/// `snake-agent 8001` or `snake-agent --port 8001`.
fn parse_port(args: &[String]) -> anyhow::Result<u16> {
    let raw = match args.iter().position(|a| a == "--port") {
        Some(i) => args.get(i + 1).context("--port needs a value")?,
        None => match args.get(1) {
            Some(arg) => arg,
            None => return Ok(DEFAULT_PORT),
        },
    };
    raw.parse()
        .with_context(|| format!("invalid port '{raw}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let port = parse_port(&args)?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!("Snake agent listening on port {port}");
    axum::serve(listener, agent_router())
        .await
        .context("agent server stopped")?;
    Ok(())
}
