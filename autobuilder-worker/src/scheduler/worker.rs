//! Worker loop
//!
//! Takes one payload at a time from the consumer, fetches the job it refers
//! to and runs the pipeline while keeping task protection alive. A job is
//! only reported once the pipeline has finished; shutdown or loss of
//! protection abandons it.

use anyhow::Result;
use autobuilder_core::domain::payload::JobsQueuePayload;
use autobuilder_core::domain::stage::StageResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::CommandRunner;
use crate::context::JobContext;
use crate::repository::{JobSink, JobStore};
use crate::scheduler::consumer::{ConsumeError, QueueConsumer};
use crate::service::PipelineOrchestrator;

/// What happened to a payload handed to the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The pipeline ran to the end and the job was reported
    Completed,
    /// The job could not be fetched
    Skipped,
    /// Shutdown arrived mid-job; nothing was reported
    Abandoned,
}

enum PipelineEnd {
    Finished(StageResult),
    ProtectionLost(ConsumeError),
    Shutdown,
}

/// Single-job-at-a-time build worker
pub struct Worker {
    consumer: QueueConsumer,
    jobs: Arc<dyn JobStore>,
    sink: Arc<dyn JobSink>,
    pipeline: PipelineOrchestrator,
    runner: Arc<dyn CommandRunner>,
    protection_refresh: Duration,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        consumer: QueueConsumer,
        jobs: Arc<dyn JobStore>,
        sink: Arc<dyn JobSink>,
        pipeline: PipelineOrchestrator,
        runner: Arc<dyn CommandRunner>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            consumer,
            jobs,
            sink,
            pipeline,
            runner,
            protection_refresh: Duration::from_secs(600),
            shutdown,
        }
    }

    /// Sets how often protection is re-asserted while a job runs
    pub fn with_protection_refresh(mut self, interval: Duration) -> Self {
        self.protection_refresh = interval;
        self
    }

    /// Runs until shutdown or a fatal protection failure
    pub async fn run(&self) -> Result<()> {
        info!("Worker started; waiting for jobs");

        loop {
            let payload = match self.consumer.poll_for_job().await {
                Ok(payload) => payload,
                Err(ConsumeError::Shutdown) => {
                    info!("Shutdown requested; worker stopping");
                    return Ok(());
                }
                Err(e) => return Err(anyhow::Error::new(e).context("Queue consumer stopped")),
            };

            match self.process(payload).await? {
                JobOutcome::Abandoned => return Ok(()),
                JobOutcome::Completed | JobOutcome::Skipped => {}
            }
        }
    }

    /// Fetches and builds the job a payload refers to
    ///
    /// Returns an error only when task protection is lost mid-job.
    pub async fn process(&self, payload: JobsQueuePayload) -> Result<JobOutcome> {
        let mut job = match self.jobs.fetch_job(&payload.job_id).await {
            Ok(job) => job,
            Err(e) => {
                error!("Failed to fetch job {}: {:#}", payload.job_id, e);
                return Ok(JobOutcome::Skipped);
            }
        };

        info!(job_id = %job.id, "Processing {:?} job {}", payload.job_type, job.title);
        let context = JobContext::new(job.id.clone(), Arc::clone(&self.runner));

        let end = tokio::select! {
            result = self.pipeline.run_pipeline(&mut job, &context) => PipelineEnd::Finished(result),
            error = self.keep_protected() => PipelineEnd::ProtectionLost(error),
            _ = self.shutdown.cancelled() => PipelineEnd::Shutdown,
        };

        match end {
            PipelineEnd::Finished(result) => {
                info!(job_id = %job.id, "Job finished with status {}", result.status);
                if let Err(e) = self.sink.report(&job).await {
                    error!("Failed to report job {}: {:#}", job.id, e);
                }
                Ok(JobOutcome::Completed)
            }
            PipelineEnd::ProtectionLost(e) => {
                error!(job_id = %job.id, "Task protection lost; abandoning job");
                Err(anyhow::Error::new(e).context(format!("Job {} abandoned", job.id)))
            }
            PipelineEnd::Shutdown => {
                warn!(job_id = %job.id, "Shutdown during build; abandoning job");
                Ok(JobOutcome::Abandoned)
            }
        }
    }

    /// Re-asserts protection on every refresh tick; returns the first failure
    async fn keep_protected(&self) -> ConsumeError {
        let mut ticker = time::interval_at(
            Instant::now() + self.protection_refresh,
            self.protection_refresh,
        );

        loop {
            ticker.tick().await;
            match self.consumer.keep_alive().await {
                Ok(()) => debug!("Task protection renewed"),
                Err(e) => return e,
            }
        }
    }
}
