//! Core domain types
//!
//! This module contains the core domain structures used across the worker.
//! These types represent the build request as it moves through the queue
//! consumer (payload validation) and the pipeline orchestrator (job mutation).

pub mod dependency;
pub mod job;
pub mod log;
pub mod payload;
pub mod prefix;
pub mod stage;
