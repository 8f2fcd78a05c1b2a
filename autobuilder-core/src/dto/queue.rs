//! Queue envelope types

use serde::{Deserialize, Serialize};

/// Raw message received from the jobs queue
///
/// Owned by the queue consumer until it is deleted. The body is decoded into
/// a [`JobsQueuePayload`](crate::domain::payload::JobsQueuePayload) only
/// after the message has been removed from the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: String,
    /// Opaque token needed to delete the message
    pub receipt_handle: String,
    pub body: Option<String>,
}
