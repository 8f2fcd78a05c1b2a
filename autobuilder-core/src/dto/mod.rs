//! Data Transfer Objects
//!
//! Types exchanged with the hosting environment rather than owned by the
//! domain: queue envelopes and trace segments.

pub mod queue;
pub mod trace;
