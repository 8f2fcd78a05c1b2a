//! Task protection repository
//!
//! Asserts "do not terminate this worker" to the hosting scheduler. Only the
//! queue consumer holds a handle to this; everything else goes through it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use autobuilder_client::TaskProtectionClient;
use tracing::{debug, info};

/// Idempotent scale-in protection signal
#[async_trait]
pub trait TaskProtection: Send + Sync {
    /// Asserts protection for the calling task
    ///
    /// Safe to call repeatedly; each call renews the lease.
    async fn protect(&self) -> Result<()>;
}

/// Protection through the ECS container agent
pub struct EcsTaskProtection {
    client: TaskProtectionClient,
    expires_in_minutes: u32,
}

impl EcsTaskProtection {
    /// Creates a protection handle
    ///
    /// # Arguments
    /// * `client` - Agent client for this task
    /// * `expires_in_minutes` - Lease length of each assertion
    pub fn new(client: TaskProtectionClient, expires_in_minutes: u32) -> Self {
        Self {
            client,
            expires_in_minutes,
        }
    }
}

#[async_trait]
impl TaskProtection for EcsTaskProtection {
    async fn protect(&self) -> Result<()> {
        let state = self
            .client
            .update_protection(true, Some(self.expires_in_minutes))
            .await
            .context("Failed to assert task protection")?;

        if !state.protection_enabled {
            anyhow::bail!("Task protection was not enabled by the agent");
        }

        debug!(
            "Task protection asserted until {}",
            state.expiration_date.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }
}

/// Protection for runs outside a managed task
#[derive(Debug, Default, Clone)]
pub struct NoopTaskProtection;

impl NoopTaskProtection {
    pub fn new() -> Self {
        info!("No task agent configured; task protection is disabled");
        Self
    }
}

#[async_trait]
impl TaskProtection for NoopTaskProtection {
    async fn protect(&self) -> Result<()> {
        debug!("Task protection skipped (no agent)");
        Ok(())
    }
}
