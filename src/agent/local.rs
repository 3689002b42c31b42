// In-process agents: local mode and tests.

use futures::future::BoxFuture;

use super::strategy::greedy_direction;
use super::{Agent, AgentError, DecisionRequest};
use crate::engine::grid::Direction;

/// The reference strategy, run in-process instead of behind HTTP.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyAgent;

impl Agent for GreedyAgent {
    fn decide(&self, request: DecisionRequest) -> BoxFuture<'_, Result<Direction, AgentError>> {
        let direction = greedy_direction(request.apple, request.head, |d| {
            request.neighborhood.get(d).is_free()
        });
        Box::pin(async move { Ok(direction) })
    }

    fn describe(&self) -> String {
        "local:greedy".to_string()
    }
}

/// Wraps a closure as an agent.
pub struct FnAgent<F> {
    name: String,
    decide: F,
}

impl<F> FnAgent<F>
where
    F: Fn(&DecisionRequest) -> Result<Direction, AgentError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, decide: F) -> Self {
        FnAgent {
            name: name.into(),
            decide,
        }
    }
}

impl<F> Agent for FnAgent<F>
where
    F: Fn(&DecisionRequest) -> Result<Direction, AgentError> + Send + Sync,
{
    fn decide(&self, request: DecisionRequest) -> BoxFuture<'_, Result<Direction, AgentError>> {
        let result = (self.decide)(&request);
        Box::pin(async move { result })
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
