// HTTP transport for the decision protocol.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;

use super::{parse_decision, Agent, AgentError, DecisionRequest};
use crate::engine::grid::Direction;

/// An agent reached over HTTP GET. Holds its own client so the connection to
/// this snake's endpoint is reused across ticks.
pub struct HttpAgent {
    address: String,
    client: Client,
    timeout: Duration,
}

impl HttpAgent {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| AgentError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpAgent {
            address: address.into(),
            client,
            timeout,
        })
    }

    /// `http://{hostname}:{port}/`
    pub fn for_port(hostname: &str, port: u16, timeout: Duration) -> Result<Self, AgentError> {
        Self::new(format!("http://{hostname}:{port}/"), timeout)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn request(&self, request: DecisionRequest) -> Result<Direction, AgentError> {
        let response = self
            .client
            .get(&self.address)
            .query(&request.to_query())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        parse_decision(&body)
    }

    fn classify(&self, error: reqwest::Error) -> AgentError {
        if error.is_timeout() {
            AgentError::Timeout(self.timeout.as_millis() as u64)
        } else {
            AgentError::Transport(error.to_string())
        }
    }
}

impl Agent for HttpAgent {
    fn decide(&self, request: DecisionRequest) -> BoxFuture<'_, Result<Direction, AgentError>> {
        Box::pin(self.request(request))
    }

    fn describe(&self) -> String {
        self.address.clone()
    }
}
