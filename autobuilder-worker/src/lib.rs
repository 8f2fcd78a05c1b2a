//! Autobuilder worker
//!
//! A long-running worker that consumes documentation build jobs from a
//! queue and drives each through the build pipeline.
//!
//! Architecture:
//! - Configuration: settings loaded from the environment
//! - Repositories: queue, task protection, job store and repo metadata
//! - Stages: adapters around the external build tools
//! - Services: pipeline orchestration and log buffering
//! - Scheduler: queue consumption and the worker loop

pub mod command;
pub mod config;
pub mod context;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod stages;
pub mod trace;

#[cfg(test)]
mod testing;
