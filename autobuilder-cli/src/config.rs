//! Configuration module
//!
//! Tool locations come from the same environment variables the worker
//! reads; the directories and failure policy can be overridden by flags.

use anyhow::Result;
use autobuilder_core::domain::stage::StageKind;
use autobuilder_worker::config::{ToolConfig, parse_stage_list};
use std::collections::HashSet;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub tools: ToolConfig,
    pub continue_on_failure: HashSet<StageKind>,
}

impl Config {
    pub fn load(repos_dir: &str, snooty_dir: &str, continue_on_failure: &str) -> Result<Self> {
        let mut tools = ToolConfig::from_env();
        tools.repos_dir = PathBuf::from(repos_dir);
        tools.snooty_dir = PathBuf::from(snooty_dir);

        Ok(Self {
            tools,
            continue_on_failure: parse_stage_list(continue_on_failure)?,
        })
    }
}
