//! Autobuilder worker binary
//!
//! Wires the worker from environment configuration and runs it until it is
//! signalled to stop or loses task protection.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autobuilder_client::{CredentialsProvider, SqsClient, TaskProtectionClient};
use autobuilder_worker::command::{CommandRunner, ProcessCommandRunner};
use autobuilder_worker::config::WorkerConfig;
use autobuilder_worker::repository::{
    EcsTaskProtection, HttpJobRepository, HttpRepoMetadataRepository, JobSink, NoopTaskProtection,
    QueueJobSink, SqsJobQueue, TaskProtection,
};
use autobuilder_worker::scheduler::{QueueConsumer, Worker};
use autobuilder_worker::service::PipelineOrchestrator;
use autobuilder_worker::trace::UdpTraceForwarder;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autobuilder_worker=info,autobuilder_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Autobuilder worker");

    let config = WorkerConfig::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: worker_id={}, jobs_queue_url={}, region={}",
        config.worker_id, config.jobs_queue_url, config.aws_region
    );

    let credentials = Arc::new(
        CredentialsProvider::from_env().context("Failed to resolve AWS credentials")?,
    );
    let sqs = Arc::new(match &config.sqs_endpoint {
        Some(endpoint) => SqsClient::with_endpoint(endpoint, &config.aws_region, credentials)?,
        None => SqsClient::new(&config.aws_region, credentials)?,
    });
    info!("Queue client initialized ({})", sqs.endpoint());

    let protection: Arc<dyn TaskProtection> = match &config.ecs_agent_uri {
        Some(uri) => Arc::new(EcsTaskProtection::new(
            TaskProtectionClient::new(uri),
            config.protection_expiry_minutes,
        )),
        None => Arc::new(NoopTaskProtection::new()),
    };

    let jobs = Arc::new(HttpJobRepository::new(config.job_api_url.clone()));
    let sink: Arc<dyn JobSink> = match &config.job_updates_queue_url {
        Some(queue_url) => Arc::new(QueueJobSink::new(Arc::clone(&sqs), queue_url.clone())),
        None => jobs.clone(),
    };
    let metadata = Arc::new(HttpRepoMetadataRepository::new(config.job_api_url.clone()));

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let consumer = QueueConsumer::new(
        Arc::new(SqsJobQueue::new(sqs, config.jobs_queue_url.clone())),
        protection,
        Arc::new(UdpTraceForwarder::new(config.trace_daemon_address.clone())),
        shutdown.clone(),
    )
    .with_wait(config.queue_wait);

    let pipeline =
        PipelineOrchestrator::standard(&config.tools, &config.continue_on_failure, metadata);
    info!("Pipeline stages: {:?}", pipeline.stage_kinds());

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessCommandRunner::new());
    let worker = Worker::new(consumer, jobs, sink, pipeline, runner, shutdown)
        .with_protection_refresh(config.protection_refresh_interval);

    info!("Worker initialized successfully");

    if let Err(e) = worker.run().await {
        error!("Worker stopped: {:#}", e);
        return Err(e);
    }

    info!("Worker stopped");
    Ok(())
}

/// Cancels `shutdown` on SIGINT or SIGTERM
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received ctrl-c"),
            _ = terminate => info!("Received SIGTERM"),
        }
        shutdown.cancel();
    });
}
