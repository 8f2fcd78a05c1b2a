//! Queue message validation

use anyhow::{Context, Result};
use autobuilder_core::domain::payload::JobsQueuePayload;
use colored::*;
use serde_json::Value as JsonValue;
use std::path::Path;

pub fn validate_file(path: &Path) -> Result<()> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    match validate_body(&body) {
        Ok(payload) => {
            println!("{} valid jobs queue message", "✓".green());
            println!("  Job type: {:?}", payload.job_type);
            println!("  Job id:   {}", payload.job_id.cyan());
            if let Some(trace) = &payload.xray_trace_id {
                println!("  Trace:    {}", trace.dimmed());
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {:#}", "✗".red(), e);
            Err(e)
        }
    }
}

/// Decodes a message body the way the worker does
fn validate_body(body: &str) -> Result<JobsQueuePayload> {
    if body.trim().is_empty() {
        anyhow::bail!("message body is empty");
    }
    let value: JsonValue = serde_json::from_str(body).context("body is not valid JSON")?;
    Ok(JobsQueuePayload::from_value(value)?)
}
