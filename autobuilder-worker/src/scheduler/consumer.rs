//! Queue consumer
//!
//! Long-polls the jobs queue and hands out one validated payload at a time.
//! Each message is handled in a fixed order:
//! 1. assert task protection (failure is fatal)
//! 2. delete the message (failure leaves it for redelivery)
//! 3. decode the body and forward any trace header
//! 4. validate the payload
//!
//! Protection always comes before deletion: once a message is deleted no
//! other worker will pick it up, so this worker must already be safe from
//! scale-in.

use autobuilder_core::domain::payload::{JobsQueuePayload, PayloadError};
use autobuilder_core::dto::queue::QueueMessage;
use autobuilder_core::dto::trace::{TraceHeader, TraceSegment};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::repository::{JobQueue, TaskProtection};
use crate::trace::TraceForwarder;

/// Body field carrying the trace header
const TRACE_FIELD: &str = "xrayTraceId";

/// Outcome of a consumption attempt that produced no payload
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// Task protection could not be asserted; the worker must stop
    #[error("task protection failed: {0:#}")]
    Fatal(anyhow::Error),

    /// The message was skipped; polling continues
    #[error(transparent)]
    Recoverable(#[from] RecoverableError),

    /// Shutdown was requested between polls
    #[error("shutdown requested")]
    Shutdown,
}

/// Conditions the consumer absorbs and logs
#[derive(Debug, Error)]
pub enum RecoverableError {
    #[error("failed to receive from the jobs queue: {0:#}")]
    Receive(anyhow::Error),

    #[error("failed to delete message {id}, leaving it for redelivery: {error:#}")]
    Delete { id: String, error: anyhow::Error },

    #[error("message {id} has no body")]
    MissingBody { id: String },

    #[error("message {id} is not valid JSON: {source}")]
    Decode {
        id: String,
        source: serde_json::Error,
    },

    #[error("message {id} rejected: {source}")]
    InvalidPayload { id: String, source: PayloadError },
}

/// Consumer of the jobs queue
pub struct QueueConsumer {
    queue: Arc<dyn JobQueue>,
    protection: Arc<dyn TaskProtection>,
    tracer: Arc<dyn TraceForwarder>,
    wait: Duration,
    error_backoff: Duration,
    shutdown: CancellationToken,
}

impl QueueConsumer {
    /// Creates a consumer
    ///
    /// # Arguments
    /// * `queue` - The jobs queue
    /// * `protection` - Task protection signal; the consumer is its only caller
    /// * `tracer` - Sink for trace segments derived from message bodies
    /// * `shutdown` - Token checked between polls
    pub fn new(
        queue: Arc<dyn JobQueue>,
        protection: Arc<dyn TaskProtection>,
        tracer: Arc<dyn TraceForwarder>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            protection,
            tracer,
            wait: Duration::from_secs(4),
            error_backoff: Duration::from_secs(1),
            shutdown,
        }
    }

    /// Sets the long-poll wait of each receive
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Sets the pause after a failed receive
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Blocks until a valid payload arrives
    ///
    /// Recoverable conditions are logged and polling continues. Returns
    /// `Fatal` when task protection fails and `Shutdown` once the shutdown
    /// token is cancelled.
    pub async fn poll_for_job(&self) -> Result<JobsQueuePayload, ConsumeError> {
        loop {
            if self.shutdown.is_cancelled() {
                return Err(ConsumeError::Shutdown);
            }

            match self.try_consume_once().await {
                Ok(Some(payload)) => return Ok(payload),
                Ok(None) => continue,
                Err(ConsumeError::Recoverable(e)) => {
                    warn!("{}", e);
                    if matches!(e, RecoverableError::Receive(_)) {
                        self.back_off().await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs one receive and, if a message arrived, processes it
    ///
    /// `Ok(None)` means the wait elapsed with nothing delivered.
    pub async fn try_consume_once(&self) -> Result<Option<JobsQueuePayload>, ConsumeError> {
        let Some(message) = self
            .queue
            .receive(self.wait)
            .await
            .map_err(RecoverableError::Receive)?
        else {
            return Ok(None);
        };

        // Untouched messages become visible again after their timeout
        if self.shutdown.is_cancelled() {
            info!("Shutdown requested; leaving message {} on the queue", message.id);
            return Err(ConsumeError::Shutdown);
        }

        let received_at = Utc::now();
        debug!("Received message {}", message.id);

        self.protection.protect().await.map_err(ConsumeError::Fatal)?;

        self.queue
            .delete(&message)
            .await
            .map_err(|error| RecoverableError::Delete {
                id: message.id.clone(),
                error,
            })?;

        let payload = self.decode(&message, received_at)?;
        info!(
            "Accepted {:?} job {} from message {}",
            payload.job_type, payload.job_id, message.id
        );
        Ok(Some(payload))
    }

    /// Re-asserts task protection for an in-flight job
    pub async fn keep_alive(&self) -> Result<(), ConsumeError> {
        self.protection.protect().await.map_err(ConsumeError::Fatal)
    }

    fn decode(
        &self,
        message: &QueueMessage,
        received_at: DateTime<Utc>,
    ) -> Result<JobsQueuePayload, RecoverableError> {
        let body = message
            .body
            .as_deref()
            .filter(|body| !body.trim().is_empty())
            .ok_or_else(|| RecoverableError::MissingBody {
                id: message.id.clone(),
            })?;

        let value: JsonValue =
            serde_json::from_str(body).map_err(|source| RecoverableError::Decode {
                id: message.id.clone(),
                source,
            })?;

        self.forward_trace(&value, received_at);

        JobsQueuePayload::from_value(value).map_err(|source| RecoverableError::InvalidPayload {
            id: message.id.clone(),
            source,
        })
    }

    fn forward_trace(&self, body: &JsonValue, received_at: DateTime<Utc>) {
        let Some(header) = body.get(TRACE_FIELD).and_then(JsonValue::as_str) else {
            return;
        };

        match TraceHeader::parse(header) {
            Some(header) => self
                .tracer
                .forward(TraceSegment::subsegment(&header, received_at, Utc::now())),
            None => warn!("Ignoring malformed trace header '{}'", header),
        }
    }

    async fn back_off(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.error_backoff) => {}
            _ = self.shutdown.cancelled() => {}
        }
    }
}
