//! SQS client
//!
//! Speaks the SQS JSON protocol (`application/x-amz-json-1.0`) directly over
//! reqwest. Only the three calls the worker needs are implemented.

use autobuilder_core::dto::queue::QueueMessage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::credentials::CredentialsProvider;
use crate::error::{ClientError, Result};
use crate::signing::{SigningScope, sign_request};

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const TARGET_PREFIX: &str = "AmazonSQS";

/// Longest long-poll SQS accepts
pub const MAX_WAIT: Duration = Duration::from_secs(20);

/// Slack added on top of the long-poll wait for the HTTP timeout
const REQUEST_SLACK: Duration = Duration::from_secs(10);

/// HTTP client for the SQS JSON API
#[derive(Debug, Clone)]
pub struct SqsClient {
    endpoint: Url,
    region: String,
    credentials: Arc<CredentialsProvider>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest<'a> {
    queue_url: &'a str,
    max_number_of_messages: u32,
    wait_time_seconds: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResponse {
    #[serde(default)]
    messages: Vec<SqsMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SqsMessage {
    message_id: String,
    receipt_handle: String,
    body: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageRequest<'a> {
    queue_url: &'a str,
    receipt_handle: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest<'a> {
    queue_url: &'a str,
    message_body: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageResponse {
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

impl SqsClient {
    /// Client for the public regional endpoint
    pub fn new(region: impl Into<String>, credentials: Arc<CredentialsProvider>) -> Result<Self> {
        let region = region.into();
        let endpoint = format!("https://sqs.{}.amazonaws.com/", region);
        Self::with_endpoint(&endpoint, region, credentials)
    }

    /// Client for a custom endpoint (e.g. a local SQS-compatible server)
    pub fn with_endpoint(
        endpoint: &str,
        region: impl Into<String>,
        credentials: Arc<CredentialsProvider>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ClientError::InvalidRequest(format!("Invalid SQS endpoint: {}", e)))?;
        Ok(Self {
            endpoint,
            region: region.into(),
            credentials,
            client: reqwest::Client::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Long-polls for at most one message
    ///
    /// Returns `None` when the wait elapsed with nothing to deliver.
    pub async fn receive_message(
        &self,
        queue_url: &str,
        wait: Duration,
    ) -> Result<Option<QueueMessage>> {
        let request = ReceiveMessageRequest {
            queue_url,
            max_number_of_messages: 1,
            wait_time_seconds: wait.min(MAX_WAIT).as_secs(),
        };

        let response: ReceiveMessageResponse = self
            .call("ReceiveMessage", &request, wait.min(MAX_WAIT) + REQUEST_SLACK)
            .await?;

        Ok(response
            .messages
            .into_iter()
            .next()
            .map(|message| QueueMessage {
                id: message.message_id,
                receipt_handle: message.receipt_handle,
                body: message.body,
            }))
    }

    /// Deletes a message by its receipt handle
    pub async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        let request = DeleteMessageRequest {
            queue_url,
            receipt_handle,
        };
        let _: serde_json::Value = self
            .call("DeleteMessage", &request, REQUEST_SLACK)
            .await?;
        Ok(())
    }

    /// Sends a message and returns its id
    pub async fn send_message(&self, queue_url: &str, body: &str) -> Result<String> {
        let request = SendMessageRequest {
            queue_url,
            message_body: body,
        };
        let response: SendMessageResponse =
            self.call("SendMessage", &request, REQUEST_SLACK).await?;
        Ok(response.message_id)
    }

    // =============================================================================
    // Transport
    // =============================================================================

    async fn call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        action: &str,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp> {
        let body = serde_json::to_vec(request)
            .map_err(|e| ClientError::InvalidRequest(format!("Failed to encode {}: {}", action, e)))?;
        let target = format!("{}.{}", TARGET_PREFIX, action);

        let credentials = self.credentials.credentials().await?;
        let headers = sign_request(
            "POST",
            &self.endpoint,
            &[("content-type", CONTENT_TYPE), ("x-amz-target", &target)],
            &body,
            &credentials,
            &SigningScope {
                region: &self.region,
                service: "sqs",
            },
            chrono::Utc::now(),
        );

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .timeout(timeout)
            .body(body);
        for (name, value) in headers {
            // reqwest derives host from the URL
            if name != "host" {
                builder = builder.header(name, value);
            }
        }

        debug!("SQS {}", action);
        let response = builder.send().await?;
        handle_response(response).await
    }
}

/// Checks the status and decodes the JSON body of an SQS response
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(ClientError::api_error(status.as_u16(), error_message(&text)));
    }

    // DeleteMessage answers with an empty body
    let text = if text.trim().is_empty() { "{}" } else { &text };
    serde_json::from_str(text)
        .map_err(|e| ClientError::ParseError(format!("Failed to parse SQS response: {}", e)))
}

fn error_message(text: &str) -> String {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) if !body.kind.is_empty() || !body.message.is_empty() => {
            let kind = body.kind.rsplit('#').next().unwrap_or_default();
            format!("{}: {}", kind, body.message)
        }
        _ => text.to_string(),
    }
}
