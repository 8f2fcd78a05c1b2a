//! Pipeline orchestrator
//!
//! Runs the stages of a job strictly in order, one at a time:
//! - Looks up the job's publish target before the first stage
//! - Records every stage's command lines on the job
//! - Halts or continues after a failure according to the stage's policy
//! - Folds the stage results into one aggregate result
//!
//! The orchestrator is the only writer of a job's mutable fields while the
//! pipeline runs.

use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::stage::{StageKind, StageResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ToolConfig;
use crate::context::{JobContext, PublishTarget};
use crate::repository::RepoMetadataRepository;
use crate::stages::{Stage, standard_stages};

/// What the orchestrator does when a stage fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagePolicy {
    /// Run the remaining stages anyway
    pub continue_on_failure: bool,
}

impl StagePolicy {
    pub fn halt() -> Self {
        Self {
            continue_on_failure: false,
        }
    }

    pub fn tolerate() -> Self {
        Self {
            continue_on_failure: true,
        }
    }
}

struct ScheduledStage {
    stage: Box<dyn Stage>,
    policy: StagePolicy,
}

/// Sequential build pipeline
pub struct PipelineOrchestrator {
    stages: Vec<ScheduledStage>,
    metadata: Arc<dyn RepoMetadataRepository>,
}

impl PipelineOrchestrator {
    /// Creates an empty pipeline
    ///
    /// # Arguments
    /// * `metadata` - Lookup for the job's bucket and base URL
    pub fn new(metadata: Arc<dyn RepoMetadataRepository>) -> Self {
        Self {
            stages: Vec::new(),
            metadata,
        }
    }

    /// Appends a stage
    pub fn with_stage(mut self, stage: Box<dyn Stage>, policy: StagePolicy) -> Self {
        self.stages.push(ScheduledStage { stage, policy });
        self
    }

    /// The standard build stages, tolerating failure of those in `continue_on_failure`
    pub fn standard(
        tools: &ToolConfig,
        continue_on_failure: &HashSet<StageKind>,
        metadata: Arc<dyn RepoMetadataRepository>,
    ) -> Self {
        standard_stages(tools)
            .into_iter()
            .fold(Self::new(metadata), |pipeline, stage| {
                let policy = if continue_on_failure.contains(&stage.kind()) {
                    StagePolicy::tolerate()
                } else {
                    StagePolicy::halt()
                };
                pipeline.with_stage(stage, policy)
            })
    }

    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.stage.kind()).collect()
    }

    /// Runs the pipeline for `job` and returns the aggregate result
    ///
    /// The job is started, updated after every stage and finished before
    /// this returns; its buffered logs are moved onto it at the end.
    pub async fn run_pipeline(&self, job: &mut Job, context: &JobContext) -> StageResult {
        job.start();
        context.log_info(format!("Starting build of {} ({})", job.title, job.id));

        self.resolve_target(job, context).await;

        let mut outputs = Vec::new();
        let mut halted: Option<(StageKind, StageResult)> = None;
        let mut tolerated: Option<(StageKind, StageResult)> = None;

        for scheduled in &self.stages {
            let kind = scheduled.stage.kind();
            debug!(job_id = %job.id, "Running stage {}", kind);

            let result = scheduled.stage.run(job, context).await;

            let commands = context.take_commands();
            if kind.is_deploy_step() {
                job.deploy_commands.extend(commands);
            } else {
                job.build_commands.extend(commands);
            }

            if !result.output.is_empty() {
                outputs.push(result.output.clone());
            }

            if result.is_success() {
                context.log_info(format!("Stage {} succeeded", kind));
                continue;
            }

            context.log_error(format!(
                "Stage {} finished with {}: {}",
                kind, result.status, result.error
            ));

            if scheduled.policy.continue_on_failure {
                tolerated.get_or_insert((kind, result));
            } else {
                context.log_error(format!("Halting pipeline after {}", kind));
                halted = Some((kind, result));
                break;
            }
        }

        let output = outputs.join("\n");
        let (result, failed_stage) = match halted.or(tolerated) {
            Some((kind, failure)) => (StageResult::failed(output, failure.error), Some(kind)),
            None => (StageResult::success(output), None),
        };

        info!(
            job_id = %job.id,
            "Pipeline finished with status {}",
            result.status
        );
        job.finish(result.clone(), failed_stage);
        job.logs.extend(context.drain_logs());

        result
    }

    async fn resolve_target(&self, job: &Job, context: &JobContext) {
        match self
            .metadata
            .fetch_repo_branches(&job.payload.repo_name)
            .await
        {
            Ok(branches) => {
                context.set_target(PublishTarget {
                    bucket: branches.bucket,
                    url: branches.url,
                });
                context.set_dependencies(branches.build_dependencies);
            }
            Err(e) => {
                context.log_error(format!(
                    "Failed to look up publish target for {}: {:#}",
                    job.payload.repo_name, e
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSpec;
    use crate::repository::{RepoBranches, StaticRepoMetadata};
    use crate::testing::{RecordingRunner, sample_job};
    use async_trait::async_trait;
    use autobuilder_core::domain::dependency::{BuildDependencies, Dependency};
    use autobuilder_core::domain::job::JobStatus;
    use autobuilder_core::domain::stage::StageStatus;
    use std::sync::Mutex;

    /// Stage that runs one command and returns a fixed result
    struct ScriptedStage {
        kind: StageKind,
        result: StageResult,
        ran: Arc<Mutex<Vec<StageKind>>>,
    }

    #[async_trait]
    impl Stage for ScriptedStage {
        fn kind(&self) -> StageKind {
            self.kind
        }

        async fn run(&self, _job: &Job, context: &JobContext) -> StageResult {
            self.ran.lock().unwrap().push(self.kind);
            let _ = context
                .run(&CommandSpec::new("tool").arg(self.kind.as_str()))
                .await;
            self.result.clone()
        }
    }

    struct Harness {
        ran: Arc<Mutex<Vec<StageKind>>>,
        pipeline: PipelineOrchestrator,
    }

    fn harness(script: Vec<(StageKind, StageResult, StagePolicy)>) -> Harness {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let metadata = Arc::new(StaticRepoMetadata::new(RepoBranches {
            project: "cloud-docs".to_string(),
            bucket: Some("bucket".to_string()),
            url: Some("https://cdn".to_string()),
            build_dependencies: vec![BuildDependencies {
                build_dir: Some("source".to_string()),
                dependencies: vec![Dependency {
                    url: "https://raw.example.com/steps.yaml".to_string(),
                    filename: "steps.yaml".to_string(),
                }],
            }],
        }));
        let pipeline = script.into_iter().fold(
            PipelineOrchestrator::new(metadata),
            |pipeline, (kind, result, policy)| {
                pipeline.with_stage(
                    Box::new(ScriptedStage {
                        kind,
                        result,
                        ran: Arc::clone(&ran),
                    }),
                    policy,
                )
            },
        );
        Harness { ran, pipeline }
    }

    fn context() -> JobContext {
        JobContext::new("job-1", Arc::new(RecordingRunner::new()))
    }

    fn ok(output: &str) -> StageResult {
        StageResult::success(output)
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let h = harness(vec![
            (StageKind::Parse, ok("parsed"), StagePolicy::halt()),
            (StageKind::Html, ok(""), StagePolicy::tolerate()),
            (StageKind::Stage, ok(""), StagePolicy::halt()),
            (StageKind::Deploy, ok("deployed"), StagePolicy::halt()),
        ]);
        let mut job = sample_job();
        let context = context();

        let result = h.pipeline.run_pipeline(&mut job, &context).await;

        assert_eq!(result, StageResult::success("parsed\ndeployed"));
        assert_eq!(job.status, Some(JobStatus::Success));
        assert!(job.start_time.is_some());
        assert!(job.end_time.is_some());
        assert_eq!(job.build_commands, vec!["tool parse", "tool html"]);
        assert_eq!(job.deploy_commands, vec!["tool stage", "tool deploy"]);
        assert!(!job.logs.is_empty());
        assert_eq!(context.target(), PublishTarget::new("bucket", "https://cdn"));
        let dependencies = context.dependencies();
        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].dependencies[0].filename, "steps.yaml");
    }

    #[tokio::test]
    async fn test_render_failure_still_stages_but_fails_job() {
        let h = harness(vec![
            (StageKind::Parse, ok(""), StagePolicy::halt()),
            (
                StageKind::Html,
                StageResult::failed("Failed in html", "Failed in html"),
                StagePolicy::tolerate(),
            ),
            (StageKind::Stage, ok(""), StagePolicy::halt()),
        ]);
        let mut job = sample_job();

        let result = h.pipeline.run_pipeline(&mut job, &context()).await;

        assert_eq!(
            *h.ran.lock().unwrap(),
            vec![StageKind::Parse, StageKind::Html, StageKind::Stage]
        );
        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(result.error, "Failed in html");
        assert_eq!(job.status, Some(JobStatus::Failed));
        assert_eq!(job.error.as_ref().map(|e| e.stage), Some(StageKind::Html));
    }

    #[tokio::test]
    async fn test_parse_failure_halts() {
        let h = harness(vec![
            (
                StageKind::Parse,
                StageResult::failed("Failed in parse", "Failed in parse"),
                StagePolicy::halt(),
            ),
            (StageKind::Persist, ok(""), StagePolicy::tolerate()),
            (StageKind::Stage, ok(""), StagePolicy::halt()),
        ]);
        let mut job = sample_job();

        let result = h.pipeline.run_pipeline(&mut job, &context()).await;

        assert_eq!(*h.ran.lock().unwrap(), vec![StageKind::Parse]);
        assert_eq!(result.error, "Failed in parse");
        assert!(job.deploy_commands.is_empty());
    }

    #[tokio::test]
    async fn test_halting_failure_takes_precedence() {
        let h = harness(vec![
            (
                StageKind::Oas,
                StageResult::failure("", "No value present for URL."),
                StagePolicy::tolerate(),
            ),
            (
                StageKind::Stage,
                StageResult::failure("", "No value present for S3 bucket."),
                StagePolicy::halt(),
            ),
            (StageKind::Deploy, ok(""), StagePolicy::halt()),
        ]);
        let mut job = sample_job();

        let result = h.pipeline.run_pipeline(&mut job, &context()).await;

        assert_eq!(result.error, "No value present for S3 bucket.");
        assert_eq!(job.error.as_ref().map(|e| e.stage), Some(StageKind::Stage));
        assert_eq!(h.ran.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_metadata_failure_leaves_target_empty() {
        struct Unavailable;

        #[async_trait]
        impl RepoMetadataRepository for Unavailable {
            async fn fetch_repo_branches(&self, _repo_name: &str) -> anyhow::Result<RepoBranches> {
                anyhow::bail!("connection refused")
            }
        }

        let pipeline = PipelineOrchestrator::new(Arc::new(Unavailable));
        let context = context();
        let mut job = sample_job();

        let result = pipeline.run_pipeline(&mut job, &context).await;

        assert!(result.is_success());
        assert_eq!(context.target(), PublishTarget::default());
        assert!(job.logs.iter().any(|log| log.message.contains("connection refused")));
    }

    #[test]
    fn test_standard_policies() {
        let metadata = Arc::new(StaticRepoMetadata::default());
        let continue_on = HashSet::from([StageKind::Html]);
        let pipeline = PipelineOrchestrator::standard(&ToolConfig::default(), &continue_on, metadata);

        assert_eq!(pipeline.stage_kinds(), StageKind::ALL.to_vec());
        let policies: Vec<_> = pipeline.stages.iter().map(|s| s.policy).collect();
        assert_eq!(policies[0], StagePolicy::halt());
        assert_eq!(policies[1], StagePolicy::halt());
        assert_eq!(policies[3], StagePolicy::tolerate());
        assert_eq!(policies[4], StagePolicy::halt());
    }
}
