//! HTML stage: renders the bundle with the frontend build

use async_trait::async_trait;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::prefix::{WORKER_USER, resolve_prefix};
use autobuilder_core::domain::stage::{StageKind, StageResult};

use super::workspace::{bundle_path, repo_dir};
use super::{Stage, execution_failed};
use crate::command::CommandSpec;
use crate::config::ToolConfig;
use crate::context::JobContext;

pub struct HtmlStage {
    tools: ToolConfig,
}

impl HtmlStage {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }

    fn command(&self, job: &Job) -> CommandSpec {
        let payload = &job.payload;
        let bundle = bundle_path(&repo_dir(&self.tools, payload));
        // The prefix does not depend on the base URL
        let prefix = resolve_prefix(payload, "", "").prefix;

        CommandSpec::new("npm")
            .args(["run", "build"])
            .cwd(&self.tools.snooty_dir)
            .env("GATSBY_MANIFEST_PATH", bundle.to_string_lossy())
            .env("GATSBY_SITE", &payload.project)
            .env("GATSBY_PARSER_USER", WORKER_USER)
            .env("GATSBY_PARSER_BRANCH", &payload.branch_name)
            .env(
                "PATH_PREFIX",
                format!("/{}/{}/{}", prefix, WORKER_USER, payload.branch_name),
            )
    }
}

#[async_trait]
impl Stage for HtmlStage {
    fn kind(&self) -> StageKind {
        StageKind::Html
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
    async fn test_html_build_environment() {
        let runner = RecordingRunner::new();
        let context = JobContext::new("job-1", Arc::new(runner.clone()));
        let tools = ToolConfig {
            snooty_dir: PathBuf::from("/snooty"),
            ..Default::default()
        };

        let result = HtmlStage::new(tools).run(&sample_job(), &context).await;
        assert!(result.is_success());

        let call = &runner.calls()[0];
        assert_eq!(call.command_line(), "npm run build");
        assert_eq!(call.cwd, Some(PathBuf::from("/snooty")));

        let env = |key: &str| {
            call.env
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(env("GATSBY_SITE").as_deref(), Some("cloud-docs"));
        assert_eq!(
            env("PATH_PREFIX"),
            Some(format!("/docs-qa/atlas/build/{}/master", WORKER_USER))
        );
    }

    #[tokio::test]
    async fn test_html_failure() {
        let runner = RecordingRunner::new();
        runner.exit_with("npm", 1);
        let context = JobContext::new("job-1", Arc::new(runner));

        let result = HtmlStage::new(ToolConfig::default())
            .run(&sample_job(), &context)
            .await;
        assert_eq!(result.error, "Failed in html");
    }
}
