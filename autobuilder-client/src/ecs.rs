//! ECS agent task-protection client
//!
//! Scale-in protection is set through the agent's local endpoint
//! (`$ECS_AGENT_URI/task-protection/v1/state`). The call needs no signing.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::DEFAULT_TIMEOUT;
use crate::error::{ClientError, Result};

/// HTTP client for the ECS agent's task-protection endpoint
#[derive(Debug, Clone)]
pub struct TaskProtectionClient {
    agent_uri: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateProtectionRequest {
    protection_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in_minutes: Option<u32>,
}

/// Protection state reported back by the agent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProtectionState {
    pub protection_enabled: bool,
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub task_arn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateProtectionResponse {
    #[serde(default)]
    protection: Option<ProtectionState>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    failure: Option<serde_json::Value>,
}

impl TaskProtectionClient {
    /// Create a client for the given agent URI (the value of `ECS_AGENT_URI`)
    pub fn new(agent_uri: impl Into<String>) -> Self {
        let agent_uri = agent_uri.into();
        Self {
            agent_uri: agent_uri.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the timeout of agent calls
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn agent_uri(&self) -> &str {
        &self.agent_uri
    }

    /// Enables or disables scale-in protection for the calling task
    pub async fn update_protection(
        &self,
        enabled: bool,
        expires_in_minutes: Option<u32>,
    ) -> Result<ProtectionState> {
        let url = format!("{}/task-protection/v1/state", self.agent_uri);
        debug!(
            "Updating task protection: enabled={}, expires_in_minutes={:?}",
            enabled, expires_in_minutes
        );

        let response = self
            .client
            .put(&url)
            .timeout(self.timeout)
            .json(&UpdateProtectionRequest {
                protection_enabled: enabled,
                expires_in_minutes,
            })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::api_error(status.as_u16(), text));
        }

        parse_protection_response(&text)
    }
}

/// The agent can answer 200 and still report an error or failure
fn parse_protection_response(text: &str) -> Result<ProtectionState> {
    let body: UpdateProtectionResponse = serde_json::from_str(text)
        .map_err(|e| ClientError::ParseError(format!("Invalid task protection response: {}", e)))?;

    if let Some(error) = body.error {
        return Err(ClientError::ProtectionRejected(error.to_string()));
    }
    if let Some(failure) = body.failure {
        return Err(ClientError::ProtectionRejected(failure.to_string()));
    }

    body.protection.ok_or_else(|| {
        ClientError::ParseError("Task protection response carried no state".to_string())
    })
}
