//! OpenAPI reference pages stage

use async_trait::async_trait;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::stage::{StageKind, StageResult};

use super::workspace::{bundle_path, repo_dir};
use super::{Stage, execution_failed};
use crate::command::CommandSpec;
use crate::config::ToolConfig;
use crate::context::JobContext;

pub struct OasPageStage {
    tools: ToolConfig,
}

impl OasPageStage {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }

    fn command(&self, job: &Job, site_url: &str) -> CommandSpec {
        let repo_dir = repo_dir(&self.tools, &job.payload);
        let bundle = bundle_path(&repo_dir);
        let output = self.tools.snooty_dir.join("public");

        CommandSpec::new("node")
            .arg(self.tools.oas_module.to_string_lossy())
            .arg("--bundle")
            .arg(bundle.to_string_lossy())
            .arg("--output")
            .arg(output.to_string_lossy())
            .arg("--redoc")
            .arg(self.tools.redoc_path.to_string_lossy())
            .arg("--repo")
            .arg(repo_dir.to_string_lossy())
            .arg("--site-url")
            .arg(site_url)
    }
}

/// Site the reference pages link back to
pub fn site_url(base_url: &str, mut_prefix: Option<&str>) -> String {
    let base_url = base_url.trim_end_matches('/');
    match mut_prefix {
        Some(prefix) => format!("{}/{}", base_url, prefix),
        None => base_url.to_string(),
    }
}

#[async_trait]
impl Stage for OasPageStage {
    fn kind(&self) -> StageKind {
        StageKind::Oas
    }

    async fn run(&self, job: &Job, context: &JobContext) -> StageResult {
        let Some(url) = context.target().url.filter(|url| !url.is_empty()) else {
            context.log_error("oas-page-build has failed. Variable for URL address was undefined.");
            return StageResult::failure(
                "Failed in oas: No value present for target url.",
                "No value present for URL.",
            );
        };

        let site_url = site_url(&url, job.payload.mut_prefix());
        match context.run_checked(&self.command(job, &site_url)).await {
            Ok(_) => StageResult::success(""),
            Err(e) => execution_failed(self.kind(), context, &e),
        }
    }
}
