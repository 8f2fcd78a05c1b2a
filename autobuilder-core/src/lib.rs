//! Autobuilder Core
//!
//! Core types and abstractions for the documentation build worker.
//!
//! This crate contains:
//! - Domain types: Jobs, payloads, stage results, path prefixes
//! - DTOs: Queue message bodies and trace segments exchanged with the
//!   hosting environment

pub mod domain;
pub mod dto;
