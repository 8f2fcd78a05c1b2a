//! Working-tree helpers shared by the stage adapters

use anyhow::{Context as _, Result};
use autobuilder_core::domain::payload::Payload;
use std::path::{Path, PathBuf};

use crate::command::CommandSpec;
use crate::config::ToolConfig;
use crate::context::JobContext;

/// Pending patch file left in the checkout by the producer
pub const PATCH_FILE: &str = "myPatch.patch";

/// Redirect rules file inside a checkout
pub const REDIRECTS_FILE: &str = "config/redirects";

/// Archive the parser writes
pub const BUNDLE_FILE: &str = "bundle.zip";

/// Length of the short patch identifier
const PATCH_ID_LEN: usize = 7;

/// Where the repository is cloned
pub fn checkout_dir(tools: &ToolConfig, payload: &Payload) -> PathBuf {
    tools.repos_dir.join(&payload.repo_name)
}

/// Checkout directory of the job's repository (or monorepo project)
pub fn repo_dir(tools: &ToolConfig, payload: &Payload) -> PathBuf {
    let dir = checkout_dir(tools, payload);
    match payload.directory() {
        Some(directory) => dir.join(directory),
        None => dir,
    }
}

pub fn bundle_path(repo_dir: &Path) -> PathBuf {
    repo_dir.join(BUNDLE_FILE)
}

pub async fn has_patch(repo_dir: &Path) -> bool {
    path_exists(&repo_dir.join(PATCH_FILE)).await
}

pub fn is_mainline(branch: &str) -> bool {
    matches!(branch, "master" | "main")
}

/// Unreadable paths count as missing
pub async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Short id of the pending patch: first characters of `git patch-id`
pub async fn patch_id(context: &JobContext, repo_dir: &Path) -> Result<String> {
    let output = context
        .run_checked(
            &CommandSpec::new("git")
                .arg("patch-id")
                .cwd(repo_dir)
                .stdin_file(repo_dir.join(PATCH_FILE)),
        )
        .await
        .context("Failed to compute patch id")?;

    let id: String = output.stdout.trim().chars().take(PATCH_ID_LEN).collect();
    if id.len() < PATCH_ID_LEN {
        anyhow::bail!("git patch-id produced no id for {}", PATCH_FILE);
    }
    Ok(id)
}

/// Commit currently checked out in `repo_dir`
pub async fn commit_hash(context: &JobContext, repo_dir: &Path) -> Result<String> {
    let output = context
        .run_checked(
            &CommandSpec::new("git")
                .args(["rev-parse", "HEAD"])
                .cwd(repo_dir),
        )
        .await
        .context("Failed to read commit hash")?;

    let hash = output.stdout.trim().to_string();
    if hash.is_empty() {
        anyhow::bail!("git rev-parse returned an empty hash");
    }
    Ok(hash)
}
