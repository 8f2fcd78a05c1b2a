//! Prepare stage: fresh checkout plus build dependencies
//!
//! Clones the job's branch into the repos directory (replacing any previous
//! checkout), moves to `newHead` when set, downloads the repository's build
//! dependencies and records the branch and redirect state for the publish
//! stages.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::payload::Payload;
use autobuilder_core::domain::stage::{StageKind, StageResult};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::workspace::{REDIRECTS_FILE, checkout_dir, path_exists, repo_dir};
use super::{Stage, execution_failed};
use crate::command::CommandSpec;
use crate::config::ToolConfig;
use crate::context::{Checkout, JobContext};
use crate::repository::{DependencyFetcher, HttpDependencyFetcher};

pub struct PrepareStage {
    tools: ToolConfig,
    fetcher: Arc<dyn DependencyFetcher>,
}

impl PrepareStage {
    pub fn new(tools: ToolConfig) -> Self {
        Self {
            tools,
            fetcher: Arc::new(HttpDependencyFetcher::new()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn DependencyFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    async fn prepare(&self, job: &Job, context: &JobContext) -> Result<Checkout> {
        let payload = &job.payload;
        let checkout_dir = checkout_dir(&self.tools, payload);

        if path_exists(&checkout_dir).await {
            context.log_info(format!(
                "Removing previous checkout at {}",
                checkout_dir.display()
            ));
            tokio::fs::remove_dir_all(&checkout_dir)
                .await
                .with_context(|| format!("Failed to remove {}", checkout_dir.display()))?;
        }
        tokio::fs::create_dir_all(&self.tools.repos_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.tools.repos_dir.display()))?;

        context
            .run_checked(&clone_command(payload, &checkout_dir))
            .await
            .context("Failed to clone repository")?;

        if let Some(new_head) = payload.new_head() {
            context
                .run_checked(
                    &CommandSpec::new("git")
                        .args(["checkout", new_head])
                        .cwd(&checkout_dir),
                )
                .await
                .with_context(|| format!("Failed to check out {}", new_head))?;
        }

        let repo_dir = repo_dir(&self.tools, payload);
        self.download_dependencies(context, &repo_dir).await?;

        let commit_branch = commit_branch(context, &checkout_dir, payload).await?;
        let has_redirects = path_exists(&repo_dir.join(REDIRECTS_FILE)).await;

        Ok(Checkout {
            commit_branch,
            has_redirects,
        })
    }

    async fn download_dependencies(&self, context: &JobContext, repo_dir: &Path) -> Result<()> {
        for group in context.dependencies() {
            let dir = match group.build_dir.as_deref().filter(|dir| !dir.is_empty()) {
                Some(build_dir) => repo_dir.join(relative_path(build_dir)?),
                None => repo_dir.to_path_buf(),
            };
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;

            for dependency in &group.dependencies {
                let target = dir.join(file_name(&dependency.filename)?);
                let body = self.fetcher.fetch(&dependency.url).await?;
                tokio::fs::write(&target, body)
                    .await
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                context.log_info(format!(
                    "Downloaded {} to {}",
                    dependency.url,
                    target.display()
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for PrepareStage {
    fn kind(&self) -> StageKind {
        StageKind::Prepare
    }

    async fn run(&self, job: &Job, context: &JobContext) -> StageResult {
        match self.prepare(job, context).await {
            Ok(checkout) => {
                context.log_info(format!(
                    "Checked out {} on branch {}",
                    job.payload.repo_name, checkout.commit_branch
                ));
                context.set_checkout(checkout);
                StageResult::success("")
            }
            Err(e) => execution_failed(self.kind(), context, &e),
        }
    }
}

fn clone_command(payload: &Payload, checkout_dir: &Path) -> CommandSpec {
    CommandSpec::new("git")
        .args(["clone", "--branch", payload.branch_name.as_str(), "--single-branch"])
        .arg(payload.url.as_str())
        .arg(checkout_dir.to_string_lossy())
}

/// Branch of the checkout; a detached HEAD reports the payload branch
async fn commit_branch(
    context: &JobContext,
    checkout_dir: &Path,
    payload: &Payload,
) -> Result<String> {
    let output = context
        .run_checked(
            &CommandSpec::new("git")
                .args(["rev-parse", "--abbrev-ref", "HEAD"])
                .cwd(checkout_dir),
        )
        .await
        .context("Failed to read checked out branch")?;

    let branch = output.stdout.trim();
    if branch.is_empty() || branch == "HEAD" {
        Ok(payload.branch_name.clone())
    } else {
        Ok(branch.to_string())
    }
}

/// A relative path that stays inside the checkout
fn relative_path(path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    if !path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
        anyhow::bail!("Build directory '{}' leaves the checkout", path.display());
    }
    Ok(path)
}

fn file_name(name: &str) -> Result<&str> {
    match Path::new(name).file_name() {
        Some(file) if file == name => Ok(name),
        _ => anyhow::bail!("Invalid dependency file name '{}'", name),
    }
}
