//! Build payloads
//!
//! Two shapes live here:
//! - [`JobsQueuePayload`]: the small envelope that travels on the jobs queue
//!   and points at a job by id.
//! - [`Payload`]: the immutable description of *what* to build, carried by
//!   the [`Job`](crate::domain::job::Job) record itself.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Classification of a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobType {
    GithubPush,
    ManifestGeneration,
    ProductionDeploy,
    Regression,
}

/// Message body expected on the jobs queue
///
/// Unknown fields are ignored; missing or mistyped required fields reject
/// the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsQueuePayload {
    pub job_type: JobType,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xray_trace_id: Option<String>,
}

/// Reasons a decoded message body is not a [`JobsQueuePayload`]
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload does not match the jobs queue schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("payload has an empty jobId")]
    EmptyJobId,
}

impl JobsQueuePayload {
    /// Validates an already-decoded message body
    ///
    /// The body is decoded in two steps so that trace correlation fields can
    /// be read before the schema check runs.
    pub fn from_value(value: JsonValue) -> Result<Self, PayloadError> {
        let payload: JobsQueuePayload = serde_json::from_value(value)?;
        if payload.job_id.trim().is_empty() {
            return Err(PayloadError::EmptyJobId);
        }
        Ok(payload)
    }
}

/// Immutable descriptor of a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub repo_name: String,
    pub project: String,
    /// Monorepo subpath of the project, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    pub branch_name: String,
    #[serde(default)]
    pub is_fork: bool,
    pub repo_owner: String,
    /// Source repository URL
    pub url: String,
    /// Staging namespace override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mut_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    /// Commit the patch applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_head: Option<String>,
    #[serde(default)]
    pub job_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub include_in_global_search: bool,
}

impl Payload {
    /// Mutation prefix with empty strings treated as absent
    pub fn mut_prefix(&self) -> Option<&str> {
        non_empty(self.mut_prefix.as_deref())
    }

    pub fn patch(&self) -> Option<&str> {
        non_empty(self.patch.as_deref())
    }

    pub fn new_head(&self) -> Option<&str> {
        non_empty(self.new_head.as_deref())
    }

    pub fn directory(&self) -> Option<&str> {
        non_empty(self.directory.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
