// Agent proxy: the engine's view of the external processes that decide each move.

pub mod http;
pub mod local;
pub mod strategy;

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::engine::grid::{Coord, Direction};
use crate::engine::neighborhood::Neighborhood;

pub use http::HttpAgent;
pub use local::{FnAgent, GreedyAgent};

/// Positional facts sent to an agent once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionRequest {
    pub apple: Coord,
    pub head: Coord,
    pub neighborhood: Neighborhood,
}

impl DecisionRequest {
    /// Query-string pairs of the decision protocol. `coord_*` repeats `head_*`
    /// for agents written against the older key names.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("apple_pos_x", self.apple.row.to_string()),
            ("apple_pos_y", self.apple.col.to_string()),
            ("head_x", self.head.row.to_string()),
            ("head_y", self.head.col.to_string()),
            ("coord_x", self.head.row.to_string()),
            ("coord_y", self.head.col.to_string()),
            ("up_head_val", self.neighborhood.up.wire().to_string()),
            ("down_head_val", self.neighborhood.down.wire().to_string()),
            ("left_head_val", self.neighborhood.left.wire().to_string()),
            ("right_head_val", self.neighborhood.right.wire().to_string()),
        ]
    }
}

/// Response payload. The direction is kept as a raw string so that unknown
/// values surface as protocol errors instead of deserialization noise.
#[derive(Debug, Deserialize)]
struct DecisionResponse {
    direction: Option<String>,
}

/// Parse an agent response body into a direction.
pub fn parse_decision(body: &str) -> Result<Direction, AgentError> {
    let response: DecisionResponse = serde_json::from_str(body)
        .map_err(|e| AgentError::Protocol(format!("malformed response: {e}")))?;
    let raw = response
        .direction
        .ok_or_else(|| AgentError::Protocol("missing 'direction' field".into()))?;
    raw.parse().map_err(AgentError::Protocol)
}

/// Why an agent produced no usable move this tick. Always recovered locally:
/// the snake forfeits its move.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent unreachable: {0}")]
    Transport(String),
    #[error("agent answered with status {0}")]
    Status(u16),
    #[error("agent did not answer within {0} ms")]
    Timeout(u64),
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl AgentError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AgentError::Transport(_) => "transport",
            AgentError::Status(_) => "status",
            AgentError::Timeout(_) => "timeout",
            AgentError::Protocol(_) => "protocol",
        }
    }
}

/// A decision maker bound to one snake. Implementations hold no reference to
/// game state; everything they know arrives in the request.
pub trait Agent: Send + Sync {
    fn decide(&self, request: DecisionRequest) -> BoxFuture<'_, Result<Direction, AgentError>>;

    /// Human-readable endpoint, used in logs.
    fn describe(&self) -> String {
        "agent".to_string()
    }
}
