//! Persist stage: hands the bundle to the persistence module

use async_trait::async_trait;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::stage::{StageKind, StageResult};

use super::workspace::{bundle_path, repo_dir};
use super::{Stage, execution_failed};
use crate::command::CommandSpec;
use crate::config::ToolConfig;
use crate::context::JobContext;

pub struct PersistStage {
    tools: ToolConfig,
}

impl PersistStage {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }

    fn command(&self, job: &Job) -> CommandSpec {
        let bundle = bundle_path(&repo_dir(&self.tools, &job.payload));
        CommandSpec::new("node")
            .arg(self.tools.persistence_module.to_string_lossy())
            .arg("--path")
            .arg(bundle.to_string_lossy())
            .arg("--githubUser")
            .arg(&job.payload.repo_owner)
            .arg("--jobId")
            .arg(&job.id)
    }
}

#[async_trait]
impl Stage for PersistStage {
    fn kind(&self) -> StageKind {
        StageKind::Persist
    }

    async fn run(&self, job: &Job, context: &JobContext) -> StageResult {
        match context.run_checked(&self.command(job)).await {
            Ok(_) => StageResult::success(""),
            Err(e) => execution_failed(self.kind(), context, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRunner, sample_job};
    use std::path::PathBuf;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_persist_arguments() {
        let runner = RecordingRunner::new();
        let context = JobContext::new("job-1", Arc::new(runner.clone()));
        let tools = ToolConfig {
            repos_dir: PathBuf::from("/repos"),
            persistence_module: PathBuf::from("/modules/persistence/index.js"),
            ..Default::default()
        };

        let result = PersistStage::new(tools).run(&sample_job(), &context).await;

        assert!(result.is_success());
        assert_eq!(
            runner.command_lines(),
            vec![
                "node /modules/persistence/index.js --path /repos/cloud-docs/bundle.zip --githubUser 10gen --jobId job-1"
            ]
        );
    }

    #[tokio::test]
    async fn test_persist_unstartable() {
        let runner = RecordingRunner::new();
        runner.unstartable("node");
        let context = JobContext::new("job-1", Arc::new(runner));

        let result = PersistStage::new(ToolConfig::default())
            .run(&sample_job(), &context)
            .await;
        assert!(!result.is_success());
        assert_eq!(result.error, "Failed in persist");
    }
}
