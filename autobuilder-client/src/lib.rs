//! Autobuilder hosting-environment clients
//!
//! Small, typed HTTP clients for the services the worker depends on:
//! - The SQS JSON API (receive, delete, send), signed with SigV4
//! - The ECS agent's task-protection endpoint
//! - Credential resolution (static keys or the container endpoint)
//!
//! # Example
//!
//! ```no_run
//! use autobuilder_client::{CredentialsProvider, SqsClient};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = Arc::new(CredentialsProvider::from_env()?);
//!     let sqs = SqsClient::new("us-east-2", credentials)?;
//!
//!     if let Some(message) = sqs
//!         .receive_message("https://sqs.us-east-2.amazonaws.com/123/jobs", Duration::from_secs(4))
//!         .await?
//!     {
//!         println!("Received {}", message.id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod credentials;
pub mod ecs;
pub mod error;
pub mod signing;
pub mod sqs;

#[cfg(test)]
mod testing;

use std::time::Duration;

/// Timeout for calls that are not long polls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// Re-export commonly used types
pub use credentials::{Credentials, CredentialsProvider};
pub use ecs::{ProtectionState, TaskProtectionClient};
pub use error::{ClientError, Result};
pub use sqs::SqsClient;
