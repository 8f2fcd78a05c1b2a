//! Scheduler layer for the worker
//!
//! Consumes jobs from the queue under task protection and drives each one
//! through the build pipeline, one job at a time.

pub mod consumer;
pub mod worker;

pub use consumer::{ConsumeError, QueueConsumer, RecoverableError};
pub use worker::{JobOutcome, Worker};
