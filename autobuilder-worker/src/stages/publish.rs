//! Publish stages: staging and deploy
//!
//! Both push the rendered site with the publish tool and share the same
//! preconditions: the job must have a bucket and a base URL. When either is
//! missing the stage fails before anything is copied or published.

use async_trait::async_trait;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::prefix::{base_prefix, resolve_prefix};
use autobuilder_core::domain::stage::{StageKind, StageResult};
use std::path::Path;

use super::workspace::{REDIRECTS_FILE, is_mainline, path_exists, repo_dir};
use super::{Stage, execution_failed};
use crate::command::CommandSpec;
use crate::config::ToolConfig;
use crate::context::JobContext;

/// Bucket and base URL of a publish, once checked
struct Destination {
    bucket: String,
    url: String,
}

/// Checks the publish preconditions
fn destination(kind: StageKind, context: &JobContext) -> Result<Destination, StageResult> {
    let target = context.target();

    let Some(bucket) = target.bucket.filter(|bucket| !bucket.is_empty()) else {
        context.log_error(format!(
            "{} has failed. Variable for S3 bucket address was undefined.",
            kind
        ));
        return Err(StageResult::failure(
            format!("Failed in {}: No value present for S3 bucket", kind),
            "No value present for S3 bucket.",
        ));
    };

    let Some(url) = target.url.filter(|url| !url.is_empty()) else {
        context.log_error(format!(
            "{} has failed. Variable for URL address was undefined.",
            kind
        ));
        return Err(StageResult::failure(
            format!("Failed in {}: No value present for target url.", kind),
            "No value present for URL.",
        ));
    };

    Ok(Destination { bucket, url })
}

/// Stages the rendered site under the job's path prefix
pub struct StagingStage {
    tools: ToolConfig,
}

impl StagingStage {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Stage for StagingStage {
    fn kind(&self) -> StageKind {
        StageKind::Stage
    }

    async fn run(&self, job: &Job, context: &JobContext) -> StageResult {
        let destination = match destination(self.kind(), context) {
            Ok(destination) => destination,
            Err(result) => return result,
        };

        let resolved = resolve_prefix(&job.payload, &destination.url, &destination.bucket);
        let repo_dir = repo_dir(&self.tools, &job.payload);

        let copy = CommandSpec::new("cp")
            .arg("-r")
            .arg(self.tools.snooty_dir.join("public").to_string_lossy())
            .arg(repo_dir.to_string_lossy());
        let publish = CommandSpec::new(&self.tools.publish_bin)
            .args(["public", destination.bucket.as_str(), "--stage"])
            .arg(format!("--prefix={}", resolved.prefix))
            .cwd(&repo_dir);

        let result = async {
            context.run_checked(&copy).await?;
            context.run_checked(&publish).await
        }
        .await;

        match result {
            Ok(_) => {
                context.log_info(format!(
                    "Hosted at {}\n\nHere are the commands: {}",
                    resolved.hosted_at_url,
                    publish.command_line()
                ));
                StageResult::success("")
            }
            Err(e) => execution_failed(self.kind(), context, &e),
        }
    }
}

/// Deploys the rendered site to its production prefix
pub struct DeployStage {
    tools: ToolConfig,
}

impl DeployStage {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }

    /// Redirects are published from mainline checkouts that carry a rules file
    ///
    /// Uses what the prepare stage recorded, falling back to the payload
    /// branch and the working tree.
    async fn with_redirects(&self, job: &Job, context: &JobContext, repo_dir: &Path) -> bool {
        match context.checkout() {
            Some(checkout) => is_mainline(&checkout.commit_branch) && checkout.has_redirects,
            None => {
                is_mainline(&job.payload.branch_name)
                    && path_exists(&repo_dir.join(REDIRECTS_FILE)).await
            }
        }
    }

    fn command(
        &self,
        job: &Job,
        destination: &Destination,
        repo_dir: &Path,
        with_redirects: bool,
    ) -> CommandSpec {
        let prefix = base_prefix(&job.payload);

        let mut spec = CommandSpec::new(&self.tools.publish_bin)
            .args(["public", destination.bucket.as_str()])
            .arg(format!("--prefix={}", prefix))
            .arg("--deploy")
            .arg(format!("--deployed-url-prefix={}", destination.url))
            .args(["--json", "--all-subdirectories"])
            .cwd(repo_dir);

        if with_redirects {
            spec = spec
                .args(["--redirects", REDIRECTS_FILE])
                .arg(format!("--redirect-prefix={}", prefix));
        }

        spec
    }
}

#[async_trait]
impl Stage for DeployStage {
    fn kind(&self) -> StageKind {
        StageKind::Deploy
    }

    async fn run(&self, job: &Job, context: &JobContext) -> StageResult {
        let destination = match destination(self.kind(), context) {
            Ok(destination) => destination,
            Err(result) => return result,
        };

        let repo_dir = repo_dir(&self.tools, &job.payload);
        let with_redirects = self.with_redirects(job, context, &repo_dir).await;
        let spec = self.command(job, &destination, &repo_dir, with_redirects);

        match context.run_checked(&spec).await {
            Ok(output) => StageResult::success(output.stdout.trim()),
            Err(e) => execution_failed(self.kind(), context, &e),
        }
    }
}
