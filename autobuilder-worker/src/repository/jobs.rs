//! Jobs repository
//!
//! Handles communication with the job store:
//! - Fetching the job a queue message refers to
//! - Reporting the terminal job record

use anyhow::{Context, Result};
use async_trait::async_trait;
use autobuilder_client::SqsClient;
use autobuilder_core::domain::job::Job;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::endpoint::endpoint;

/// Repository trait for reading jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetches a job by id
    ///
    /// # Arguments
    /// * `job_id` - The `jobId` carried by the queue message
    async fn fetch_job(&self, job_id: &str) -> Result<Job>;
}

/// Sink for terminal job records
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Reports a job that reached `success` or `failed`
    async fn report(&self, job: &Job) -> Result<()>;
}

/// HTTP implementation of JobStore and JobSink
pub struct HttpJobRepository {
    client: Client,
    api_url: String,
    timeout: Duration,
}

impl HttpJobRepository {
    /// Creates a new HTTP job repository
    ///
    /// # Arguments
    /// * `api_url` - Base URL of the job API (e.g., "http://localhost:8080")
    pub fn new(api_url: String) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout: autobuilder_client::DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl JobStore for HttpJobRepository {
    async fn fetch_job(&self, job_id: &str) -> Result<Job> {
        let url = endpoint(&self.api_url, &["api", "jobs", job_id])?;

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to fetch job")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to fetch job {}: {} - {}", job_id, status, body);
        }

        let job = response
            .json::<Job>()
            .await
            .context("Failed to parse job")?;

        Ok(job)
    }
}

#[async_trait]
impl JobSink for HttpJobRepository {
    async fn report(&self, job: &Job) -> Result<()> {
        let url = endpoint(&self.api_url, &["api", "jobs", &job.id])?;

        let response = self
            .client
            .put(url)
            .timeout(self.timeout)
            .json(job)
            .send()
            .await
            .context("Failed to report job")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to report job {}: {} - {}", job.id, status, body);
        }

        Ok(())
    }
}

/// Reports terminal jobs as messages on the job updates queue
pub struct QueueJobSink {
    client: Arc<SqsClient>,
    queue_url: String,
}

impl QueueJobSink {
    pub fn new(client: Arc<SqsClient>, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl JobSink for QueueJobSink {
    async fn report(&self, job: &Job) -> Result<()> {
        let body = serde_json::to_string(job).context("Failed to serialize job")?;
        self.client
            .send_message(&self.queue_url, &body)
            .await
            .with_context(|| format!("Failed to send update for job {}", job.id))?;
        Ok(())
    }
}
