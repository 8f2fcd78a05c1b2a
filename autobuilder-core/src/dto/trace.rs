//! Trace correlation types
//!
//! The producer may attach an X-Ray style trace header to a queued job
//! (`Root=<trace id>;Parent=<segment id>;Sampled=1`). The worker emits a
//! subsegment under that parent so the build shows up in the request trace.

use serde::{Deserialize, Serialize};

/// Name the worker reports its subsegments under
pub const SEGMENT_NAME: &str = "Autobuilder";

/// Parsed inbound trace header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    pub trace_id: String,
    pub parent_id: String,
}

impl TraceHeader {
    /// Parses `Root=..;Parent=..[;..]`
    ///
    /// The first field is taken as the trace id and the second as the parent
    /// segment, regardless of key names.
    pub fn parse(header: &str) -> Option<Self> {
        let mut fields = header.split(';').map(|field| field.trim());

        let trace_id = field_value(fields.next()?)?;
        let parent_id = field_value(fields.next()?)?;

        Some(Self {
            trace_id: trace_id.to_string(),
            parent_id: parent_id.to_string(),
        })
    }
}

fn field_value(field: &str) -> Option<&str> {
    let (_, value) = field.split_once('=')?;
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Subsegment document sent to the trace collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSegment {
    pub name: String,
    pub id: String,
    pub trace_id: String,
    pub parent_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Seconds since the epoch
    pub start_time: f64,
    pub end_time: f64,
}

impl TraceSegment {
    /// Builds a subsegment of `header` spanning `start..end`
    pub fn subsegment(
        header: &TraceHeader,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            name: SEGMENT_NAME.to_string(),
            id: uuid::Uuid::new_v4().simple().to_string(),
            trace_id: header.trace_id.clone(),
            parent_id: header.parent_id.clone(),
            kind: "subsegment".to_string(),
            start_time: epoch_seconds(start),
            end_time: epoch_seconds(end),
        }
    }
}

fn epoch_seconds(at: chrono::DateTime<chrono::Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}
