//! Job domain types

use serde::{Deserialize, Serialize};

use crate::domain::log::LogEntry;
use crate::domain::payload::Payload;
use crate::domain::stage::{StageKind, StageResult};

/// Build job record
///
/// Created by the producer when the job is enqueued; mutated only by the
/// pipeline orchestrator while it runs; reported to a sink once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "_id")]
    pub id: String,
    pub payload: Payload,
    pub created_time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// `None` until the worker picks the job up
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub error: Option<JobError>,
    #[serde(default)]
    pub build_commands: Vec<String>,
    #[serde(default)]
    pub deploy_commands: Vec<String>,
    /// Requester
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub result: Option<StageResult>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    InProgress,
    Success,
    Failed,
}

/// Structured failure attached to a failed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub stage: StageKind,
    pub message: String,
}

impl Job {
    /// Creates a fresh, not yet started job for a payload
    pub fn new(id: impl Into<String>, payload: Payload) -> Self {
        let title = format!("{}/{}", payload.repo_owner, payload.repo_name);
        Self {
            id: id.into(),
            payload,
            created_time: chrono::Utc::now(),
            start_time: None,
            end_time: None,
            status: None,
            error: None,
            build_commands: Vec::new(),
            deploy_commands: Vec::new(),
            user: String::new(),
            email: String::new(),
            title,
            result: None,
            logs: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, Some(JobStatus::Success) | Some(JobStatus::Failed))
    }

    /// Marks the job as picked up by this worker
    pub fn start(&mut self) {
        self.status = Some(JobStatus::InProgress);
        self.start_time = Some(chrono::Utc::now());
        self.end_time = None;
        self.error = None;
    }

    /// Records the terminal outcome of the pipeline
    pub fn finish(&mut self, result: StageResult, failed_stage: Option<StageKind>) {
        self.end_time = Some(chrono::Utc::now());
        match failed_stage {
            Some(stage) if !result.is_success() => {
                self.status = Some(JobStatus::Failed);
                self.error = Some(JobError {
                    stage,
                    message: result.error.clone(),
                });
            }
            _ if result.is_success() => {
                self.status = Some(JobStatus::Success);
                self.error = None;
            }
            _ => {
                self.status = Some(JobStatus::Failed);
            }
        }
        self.result = Some(result);
    }
}
