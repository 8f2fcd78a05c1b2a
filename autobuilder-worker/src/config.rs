//! Worker configuration
//!
//! Defines all configurable parameters for the worker: where jobs come from,
//! how task protection is held, and where the build tools live.

use autobuilder_core::domain::stage::StageKind;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration
///
/// Every component receives the parts it needs at construction; nothing
/// reads the environment after startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identifier used in logs
    pub worker_id: String,

    /// Queue the worker consumes build jobs from
    pub jobs_queue_url: String,

    /// Queue terminal job records are sent to, if any
    pub job_updates_queue_url: Option<String>,

    pub aws_region: String,

    /// Overrides the regional SQS endpoint (local SQS-compatible servers)
    pub sqs_endpoint: Option<String>,

    /// Base URL of the job and repository metadata API
    pub job_api_url: String,

    /// ECS agent URI; `None` disables task protection (local runs)
    pub ecs_agent_uri: Option<String>,

    /// Lifetime requested for each protection assertion
    pub protection_expiry_minutes: u32,

    /// How often protection is re-asserted while a job runs
    pub protection_refresh_interval: Duration,

    /// Long-poll wait per receive call
    pub queue_wait: Duration,

    /// Address of the trace collector daemon
    pub trace_daemon_address: String,

    pub tools: ToolConfig,

    /// Stages whose failure does not stop the pipeline
    pub continue_on_failure: HashSet<StageKind>,
}

/// Locations of the external build tools
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Directory holding one checkout per repository
    pub repos_dir: PathBuf,

    /// Frontend checkout the HTML is rendered from
    pub snooty_dir: PathBuf,

    pub parser_bin: String,
    pub publish_bin: String,
    pub persistence_module: PathBuf,
    pub oas_module: PathBuf,
    pub redoc_path: PathBuf,
    pub rstspec_url: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            repos_dir: PathBuf::from("repos"),
            snooty_dir: PathBuf::from("snooty"),
            parser_bin: "snooty".to_string(),
            publish_bin: "mut-publish".to_string(),
            persistence_module: PathBuf::from("modules/persistence/dist/index.js"),
            oas_module: PathBuf::from("modules/oas-page-builder/dist/index.js"),
            redoc_path: PathBuf::from("redoc/cli/index.js"),
            rstspec_url:
                "https://raw.githubusercontent.com/mongodb/snooty-parser/latest/snooty/rstspec.toml"
                    .to_string(),
        }
    }
}

impl ToolConfig {
    /// Reads tool locations from the environment, keeping defaults for unset
    /// variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            repos_dir: var("REPOS_DIR").map(PathBuf::from).unwrap_or(defaults.repos_dir),
            snooty_dir: var("SNOOTY_DIR").map(PathBuf::from).unwrap_or(defaults.snooty_dir),
            parser_bin: var("SNOOTY_BIN").unwrap_or(defaults.parser_bin),
            publish_bin: var("MUT_PUBLISH_BIN").unwrap_or(defaults.publish_bin),
            persistence_module: var("PERSISTENCE_MODULE")
                .map(PathBuf::from)
                .unwrap_or(defaults.persistence_module),
            oas_module: var("OAS_MODULE")
                .map(PathBuf::from)
                .unwrap_or(defaults.oas_module),
            redoc_path: var("REDOC_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.redoc_path),
            rstspec_url: var("RSTSPEC_URL").unwrap_or(defaults.rstspec_url),
        }
    }
}

/// Stages that tolerate failure unless configured otherwise
pub fn default_continue_on_failure() -> HashSet<StageKind> {
    [StageKind::Persist, StageKind::Html, StageKind::Oas]
        .into_iter()
        .collect()
}

/// Parses a comma-separated list of stage names
pub fn parse_stage_list(value: &str) -> anyhow::Result<HashSet<StageKind>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.parse::<StageKind>().map_err(anyhow::Error::msg))
        .collect()
}

impl WorkerConfig {
    /// Creates a new configuration with defaults
    pub fn new(jobs_queue_url: String, job_api_url: String) -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            jobs_queue_url,
            job_updates_queue_url: None,
            aws_region: "us-east-2".to_string(),
            sqs_endpoint: None,
            job_api_url,
            ecs_agent_uri: None,
            protection_expiry_minutes: 120,
            protection_refresh_interval: Duration::from_secs(600),
            queue_wait: Duration::from_secs(4),
            trace_daemon_address: "127.0.0.1:2000".to_string(),
            tools: ToolConfig::default(),
            continue_on_failure: default_continue_on_failure(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - JOBS_QUEUE_URL (required)
    /// - JOB_API_URL (required)
    /// - WORKER_ID (optional, default: random)
    /// - JOB_UPDATES_QUEUE_URL (optional)
    /// - AWS_REGION (optional, default: us-east-2)
    /// - SQS_ENDPOINT (optional)
    /// - ECS_AGENT_URI (optional, set by ECS)
    /// - PROTECTION_EXPIRY_MINUTES (optional, default: 120)
    /// - PROTECTION_REFRESH_SECS (optional, default: 600)
    /// - QUEUE_WAIT_SECS (optional, default: 4)
    /// - XRAY_DAEMON_ADDRESS (optional, default: 127.0.0.1:2000)
    /// - CONTINUE_ON_FAILURE (optional, default: persist,html,oas)
    /// - tool locations, see [`ToolConfig::from_env`]
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let jobs_queue_url = var("JOBS_QUEUE_URL")
            .ok_or_else(|| anyhow::anyhow!("JOBS_QUEUE_URL environment variable not set"))?;

        let job_api_url = var("JOB_API_URL")
            .ok_or_else(|| anyhow::anyhow!("JOB_API_URL environment variable not set"))?;

        let mut config = Self::new(jobs_queue_url, job_api_url);

        if let Some(worker_id) = var("WORKER_ID") {
            config.worker_id = worker_id;
        }
        config.job_updates_queue_url = var("JOB_UPDATES_QUEUE_URL");
        if let Some(region) = var("AWS_REGION") {
            config.aws_region = region;
        }
        config.sqs_endpoint = var("SQS_ENDPOINT");
        config.ecs_agent_uri = var("ECS_AGENT_URI");

        if let Some(minutes) = var("PROTECTION_EXPIRY_MINUTES").and_then(|s| s.parse().ok()) {
            config.protection_expiry_minutes = minutes;
        }

        if let Some(refresh) = var("PROTECTION_REFRESH_SECS").and_then(|s| s.parse::<u64>().ok())
        {
            config.protection_refresh_interval = Duration::from_secs(refresh);
        }

        if let Some(wait) = var("QUEUE_WAIT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            config.queue_wait = Duration::from_secs(wait);
        }

        if let Some(address) = var("XRAY_DAEMON_ADDRESS") {
            config.trace_daemon_address = address;
        }

        if let Some(stages) = var("CONTINUE_ON_FAILURE") {
            config.continue_on_failure = parse_stage_list(&stages)?;
        }

        config.tools = ToolConfig::from_env();

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            anyhow::bail!("worker_id cannot be empty");
        }

        if self.jobs_queue_url.is_empty() {
            anyhow::bail!("jobs_queue_url cannot be empty");
        }

        for (name, url) in [
            ("jobs_queue_url", Some(&self.jobs_queue_url)),
            ("job_updates_queue_url", self.job_updates_queue_url.as_ref()),
            ("job_api_url", Some(&self.job_api_url)),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("{} must start with http:// or https://", name);
                }
            }
        }

        if self.queue_wait.as_secs() == 0 || self.queue_wait > autobuilder_client::sqs::MAX_WAIT {
            anyhow::bail!("queue_wait must be between 1 and 20 seconds");
        }

        if self.protection_expiry_minutes == 0 {
            anyhow::bail!("protection_expiry_minutes must be greater than 0");
        }

        // A refresh slower than the expiry would let protection lapse mid-job
        if self.protection_refresh_interval.as_secs() == 0
            || self.protection_refresh_interval.as_secs()
                >= u64::from(self.protection_expiry_minutes) * 60
        {
            anyhow::bail!("protection_refresh_interval must be non-zero and shorter than the protection expiry");
        }

        for stage in [
            StageKind::Prepare,
            StageKind::Parse,
            StageKind::Stage,
            StageKind::Deploy,
        ] {
            if self.continue_on_failure.contains(&stage) {
                anyhow::bail!("stage '{}' cannot be configured to continue on failure", stage);
            }
        }

        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new(
            "http://localhost:9324/000000000000/jobs".to_string(),
            "http://localhost:8080".to_string(),
        )
    }
}
