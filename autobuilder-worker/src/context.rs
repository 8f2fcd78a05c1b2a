//! Execution context for build jobs
//!
//! Contains all state a stage needs besides the job itself:
//! - Log buffer the stage writes to (the job's "logger")
//! - Command runner for the external build tools
//! - Record of the command lines run, for the job's command logs
//! - The publish target (bucket and base URL) looked up for the job
//! - What the prepare stage learned about the checkout

use anyhow::Result;
use autobuilder_core::domain::dependency::BuildDependencies;
use autobuilder_core::domain::log::{LogEntry, LogLevel};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::service::{InMemoryLogBuffer, LogBufferService};

/// Where a job's output is published
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishTarget {
    pub bucket: Option<String>,
    pub url: Option<String>,
}

impl PublishTarget {
    pub fn new(bucket: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            url: Some(url.into()),
        }
    }
}

/// State of the working tree after checkout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkout {
    /// Branch actually checked out
    pub commit_branch: String,
    pub has_redirects: bool,
}

/// Execution context shared across the stages of one job
pub struct JobContext {
    job_id: String,
    log_buffer: Arc<dyn LogBufferService>,
    runner: Arc<dyn CommandRunner>,
    commands: Mutex<Vec<String>>,
    target: Mutex<PublishTarget>,
    dependencies: Mutex<Vec<BuildDependencies>>,
    checkout: Mutex<Option<Checkout>>,
}

impl JobContext {
    /// Creates a new execution context
    ///
    /// # Arguments
    /// * `job_id` - The job ID, used to tag mirrored log lines
    /// * `runner` - Runner for external commands
    pub fn new(job_id: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            job_id: job_id.into(),
            log_buffer: Arc::new(InMemoryLogBuffer::new()),
            runner,
            commands: Mutex::new(Vec::new()),
            target: Mutex::new(PublishTarget::default()),
            dependencies: Mutex::new(Vec::new()),
            checkout: Mutex::new(None),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn set_target(&self, target: PublishTarget) {
        *self.target.lock().unwrap() = target;
    }

    pub fn target(&self) -> PublishTarget {
        self.target.lock().unwrap().clone()
    }

    pub fn set_dependencies(&self, dependencies: Vec<BuildDependencies>) {
        *self.dependencies.lock().unwrap() = dependencies;
    }

    pub fn dependencies(&self) -> Vec<BuildDependencies> {
        self.dependencies.lock().unwrap().clone()
    }

    pub fn set_checkout(&self, checkout: Checkout) {
        *self.checkout.lock().unwrap() = Some(checkout);
    }

    /// `None` until the prepare stage has run
    pub fn checkout(&self) -> Option<Checkout> {
        self.checkout.lock().unwrap().clone()
    }

    /// Adds a log entry and mirrors it to tracing
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => debug!(job_id = %self.job_id, "{}", message),
            LogLevel::Info => info!(job_id = %self.job_id, "{}", message),
            LogLevel::Warning => warn!(job_id = %self.job_id, "{}", message),
            LogLevel::Error => error!(job_id = %self.job_id, "{}", message),
        }
        self.log_buffer.add_entry(LogEntry::new(level, message));
    }

    pub fn log_debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn log_info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn log_error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Drains all log entries from the buffer
    pub fn drain_logs(&self) -> Vec<LogEntry> {
        self.log_buffer.drain()
    }

    /// Takes the command lines recorded since the last call
    pub fn take_commands(&self) -> Vec<String> {
        std::mem::take(&mut *self.commands.lock().unwrap())
    }

    /// Runs a command, recording it and logging its output
    ///
    /// Output is logged line-trimmed: stdout at info, stderr at warning.
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(spec.command_line());

        let output = self.runner.run(spec).await?;

        let stdout = output.stdout.trim();
        if !stdout.is_empty() {
            self.log_info(stdout.to_string());
        }
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            self.log_warning(stderr.to_string());
        }

        Ok(output)
    }

    /// Runs a command and fails on a non-zero exit code
    pub async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec).await?;
        if !output.success() {
            anyhow::bail!(
                "'{}' exited with code {}: {}",
                spec.command_line(),
                output.exit_code,
                output.stderr.trim()
            );
        }
        Ok(output)
    }
}
