//! Stage result contract
//!
//! Every pipeline stage returns a [`StageResult`]. Errors never cross a stage
//! boundary as `Err`; they are normalized into a failed result here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Checkout and build dependencies
    Prepare,
    Parse,
    Persist,
    Html,
    Oas,
    Stage,
    Deploy,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::Prepare,
        StageKind::Parse,
        StageKind::Persist,
        StageKind::Html,
        StageKind::Oas,
        StageKind::Stage,
        StageKind::Deploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Prepare => "prepare",
            StageKind::Parse => "parse",
            StageKind::Persist => "persist",
            StageKind::Html => "html",
            StageKind::Oas => "oas",
            StageKind::Stage => "stage",
            StageKind::Deploy => "deploy",
        }
    }

    /// Whether commands run by this stage are publish commands
    pub fn is_deploy_step(&self) -> bool {
        matches!(self, StageKind::Stage | StageKind::Deploy)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

/// Outcome of a stage
///
/// `Failure` marks a precondition that stopped the stage before any external
/// call; `Failed` marks an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failure,
    Failed,
}

impl StageStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Success => "success",
            StageStatus::Failure => "failure",
            StageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform `{status, output, error}` result of a stage
///
/// Construct through [`StageResult::success`] so that a successful result
/// always has an empty `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub status: StageStatus,
    pub output: String,
    pub error: String,
}

impl StageResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Success,
            output: output.into(),
            error: String::new(),
        }
    }

    /// A precondition failed and nothing was executed
    pub fn failure(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Failure,
            output: output.into(),
            error: error.into(),
        }
    }

    /// Execution failed
    pub fn failed(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Failed,
            output: output.into(),
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
