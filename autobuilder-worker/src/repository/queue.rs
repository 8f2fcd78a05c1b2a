//! Job queue repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use autobuilder_client::SqsClient;
use autobuilder_core::dto::queue::QueueMessage;
use std::sync::Arc;
use std::time::Duration;

/// Repository trait for the queue jobs are delivered on
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Long-polls for at most one message
    ///
    /// # Arguments
    /// * `wait` - Upper bound on how long the call may block
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>>;

    /// Removes a message from shared visibility
    async fn delete(&self, message: &QueueMessage) -> Result<()>;
}

/// SQS implementation of JobQueue
pub struct SqsJobQueue {
    client: Arc<SqsClient>,
    queue_url: String,
}

impl SqsJobQueue {
    pub fn new(client: Arc<SqsClient>, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl JobQueue for SqsJobQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>> {
        self.client
            .receive_message(&self.queue_url, wait)
            .await
            .context("Failed to receive message")
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        self.client
            .delete_message(&self.queue_url, &message.receipt_handle)
            .await
            .with_context(|| format!("Failed to delete message {}", message.id))
    }
}
