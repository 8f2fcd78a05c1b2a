//! Parse stage: source tree -> bundle archive

use async_trait::async_trait;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::stage::{StageKind, StageResult};

use super::workspace::{bundle_path, commit_hash, has_patch, patch_id, repo_dir};
use super::{Stage, execution_failed};
use crate::command::CommandSpec;
use crate::config::ToolConfig;
use crate::context::JobContext;

pub struct ParseStage {
    tools: ToolConfig,
}

impl ParseStage {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }

    /// Builds the parser invocation, adding `--commit`/`--patch` when the
    /// checkout carries a pending patch
    async fn command(&self, job: &Job, context: &JobContext) -> anyhow::Result<CommandSpec> {
        let repo_dir = repo_dir(&self.tools, &job.payload);
        let bundle = bundle_path(&repo_dir);

        let mut spec = CommandSpec::new(&self.tools.parser_bin)
            .arg("build")
            .arg(repo_dir.to_string_lossy())
            .arg("--output")
            .arg(bundle.to_string_lossy())
            .arg(format!("--rstspec={}", self.tools.rstspec_url));

        if has_patch(&repo_dir).await {
            let (patch, commit) = tokio::try_join!(
                patch_id(context, &repo_dir),
                commit_hash(context, &repo_dir)
            )?;
            context.log_info(format!("Parsing patched build: commit {} patch {}", commit, patch));
            spec = spec.args(["--commit".to_string(), commit, "--patch".to_string(), patch]);
        }

        Ok(spec)
    }
}

#[async_trait]
impl Stage for ParseStage {
    fn kind(&self) -> StageKind {
        StageKind::Parse
    }

    async fn run(&self, job: &Job, context: &JobContext) -> StageResult {
        let result = async {
            let spec = self.command(job, context).await?;
            context.run_checked(&spec).await
        }
        .await;

        match result {
            Ok(_) => StageResult::success(""),
            Err(e) => execution_failed(self.kind(), context, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::workspace::PATCH_FILE;
    use crate::testing::{RecordingRunner, sample_job};
    use autobuilder_core::domain::stage::StageStatus;
    use std::sync::Arc;

    fn tools(repos_dir: &std::path::Path) -> ToolConfig {
        ToolConfig {
            repos_dir: repos_dir.to_path_buf(),
            rstspec_url: "https://example.com/rstspec.toml".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_parse_without_patch() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        let context = JobContext::new("job-1", Arc::new(runner.clone()));

        let result = ParseStage::new(tools(dir.path()))
            .run(&sample_job(), &context)
            .await;

        assert!(result.is_success());
        let repo = dir.path().join("cloud-docs");
        assert_eq!(
            runner.command_lines(),
            vec![format!(
                "snooty build {} --output {}/bundle.zip --rstspec=https://example.com/rstspec.toml",
                repo.display(),
                repo.display()
            )]
        );
    }

    #[tokio::test]
    async fn test_parse_with_patch_passes_commit_and_patch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("cloud-docs");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join(PATCH_FILE), "diff --git a/a b/a\n").unwrap();

        let runner = RecordingRunner::new();
        runner.respond_stdout("git patch-id", "1234567890abcdef 0000\n");
        runner.respond_stdout("git rev-parse", "abc123def\n");
        let context = JobContext::new("job-1", Arc::new(runner.clone()));

        let result = ParseStage::new(tools(dir.path()))
            .run(&sample_job(), &context)
            .await;
        assert!(result.is_success());

        let parse_call = runner
            .calls()
            .into_iter()
            .find(|call| call.program == "snooty")
            .unwrap();
        let tail: Vec<_> = parse_call.args.iter().rev().take(4).rev().cloned().collect();
        assert_eq!(tail, vec!["--commit", "abc123def", "--patch", "1234567"]);
    }

    #[tokio::test]
    async fn test_parse_failure_does_not_leak_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        runner.exit_with("snooty", 2);
        let context = JobContext::new("job-1", Arc::new(runner));

        let result = ParseStage::new(tools(dir.path()))
            .run(&sample_job(), &context)
            .await;

        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(result.error, "Failed in parse");
        let logs = context.drain_logs();
        assert!(logs.iter().any(|entry| entry.message.contains("exited with code 2")));
    }
}
