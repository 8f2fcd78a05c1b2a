//! Local pipeline runs
//!
//! Builds a job from a payload file and runs the standard pipeline against
//! fixed publish metadata, printing the job's log as it ends up recorded.

use anyhow::{Context, Result};
use autobuilder_core::domain::dependency::BuildDependencies;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::log::{LogEntry, LogLevel};
use autobuilder_core::domain::payload::Payload;
use autobuilder_core::domain::stage::StageResult;
use autobuilder_worker::command::ProcessCommandRunner;
use autobuilder_worker::context::JobContext;
use autobuilder_worker::repository::{RepoBranches, StaticRepoMetadata};
use autobuilder_worker::service::PipelineOrchestrator;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;

/// Publish metadata a local run stands in for the metadata service
pub struct LocalTarget {
    pub bucket: Option<String>,
    pub url: Option<String>,
    /// File holding a `buildDependencies` list
    pub dependencies: Option<PathBuf>,
}

pub async fn run_local(
    config: &Config,
    payload_path: &Path,
    target: LocalTarget,
    job_id: Option<String>,
) -> Result<()> {
    let payload = read_payload(payload_path)?;
    let build_dependencies = match &target.dependencies {
        Some(path) => read_dependencies(path)?,
        None => Vec::new(),
    };
    let job_id = job_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    let mut job = Job::new(job_id, payload);

    let metadata = Arc::new(StaticRepoMetadata::new(RepoBranches {
        project: job.payload.project.clone(),
        bucket: target.bucket,
        url: target.url,
        build_dependencies,
    }));
    let pipeline =
        PipelineOrchestrator::standard(&config.tools, &config.continue_on_failure, metadata);
    let context = JobContext::new(job.id.clone(), Arc::new(ProcessCommandRunner::new()));

    println!(
        "{}",
        format!("Building {} ({}) as job {}", job.title, job.payload.branch_name, job.id).bold()
    );
    println!("{}", "─".repeat(80).dimmed());

    let result = pipeline.run_pipeline(&mut job, &context).await;

    for log in &job.logs {
        print_log_entry(log);
    }
    println!("{}", "─".repeat(80).dimmed());

    print_commands("Build commands", &job.build_commands);
    print_commands("Deploy commands", &job.deploy_commands);
    print_result(&result);

    if !result.is_success() {
        anyhow::bail!("Build failed: {}", result.error);
    }
    Ok(())
}

fn read_payload(path: &Path) -> Result<Payload> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse payload file {}", path.display()))
}

fn read_dependencies(path: &Path) -> Result<Vec<BuildDependencies>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dependencies file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse dependencies file {}", path.display()))
}

fn print_log_entry(log: &LogEntry) {
    let level = match log.level {
        LogLevel::Debug => "DEBUG".dimmed(),
        LogLevel::Info => "INFO ".blue(),
        LogLevel::Warning => "WARN ".yellow(),
        LogLevel::Error => "ERROR".red(),
    };
    println!(
        "{} {} {}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level,
        log.message
    );
}

fn print_commands(title: &str, commands: &[String]) {
    if commands.is_empty() {
        return;
    }
    println!("\n{}", format!("{}:", title).bold());
    for command in commands {
        println!("  {} {}", "$".dimmed(), command);
    }
}

fn print_result(result: &StageResult) {
    println!("\n{}", "Result:".bold());
    let status = if result.is_success() {
        result.status.to_string().green()
    } else {
        result.status.to_string().red()
    };
    println!("  Status: {}", status);
    if !result.error.is_empty() {
        println!("  Error:  {}", result.error.red());
    }
    if !result.output.is_empty() {
        println!("  Output:\n{}", result.output);
    }
}
