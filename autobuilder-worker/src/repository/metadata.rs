//! Repository metadata lookup
//!
//! Read-only service mapping a repository to its project and publish
//! target. A missing bucket or URL is not an error here; the publish
//! stages report it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use autobuilder_core::domain::dependency::BuildDependencies;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::endpoint::endpoint;

/// Publish metadata of a repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoBranches {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Files to download into the checkout before parsing
    #[serde(default, rename = "buildDependencies")]
    pub build_dependencies: Vec<BuildDependencies>,
}

/// Repository trait for metadata lookups
#[async_trait]
pub trait RepoMetadataRepository: Send + Sync {
    /// Looks up the publish metadata of `repo_name`
    async fn fetch_repo_branches(&self, repo_name: &str) -> Result<RepoBranches>;
}

/// HTTP implementation of RepoMetadataRepository
pub struct HttpRepoMetadataRepository {
    client: Client,
    api_url: String,
    timeout: Duration,
}

impl HttpRepoMetadataRepository {
    pub fn new(api_url: String) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout: autobuilder_client::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl RepoMetadataRepository for HttpRepoMetadataRepository {
    async fn fetch_repo_branches(&self, repo_name: &str) -> Result<RepoBranches> {
        let url = endpoint(&self.api_url, &["api", "repos", repo_name, "branches"])?;

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to fetch repo metadata")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Failed to fetch metadata for {}: {} - {}",
                repo_name,
                status,
                body
            );
        }

        response
            .json::<RepoBranches>()
            .await
            .context("Failed to parse repo metadata")
    }
}

/// Fixed metadata, for local runs
#[derive(Debug, Clone, Default)]
pub struct StaticRepoMetadata {
    branches: RepoBranches,
}

impl StaticRepoMetadata {
    pub fn new(branches: RepoBranches) -> Self {
        Self { branches }
    }
}

#[async_trait]
impl RepoMetadataRepository for StaticRepoMetadata {
    async fn fetch_repo_branches(&self, _repo_name: &str) -> Result<RepoBranches> {
        Ok(self.branches.clone())
    }
}
