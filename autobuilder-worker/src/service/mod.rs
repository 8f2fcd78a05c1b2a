//! Service layer
//!
//! Services contain the worker's business logic: buffering a job's logs and
//! driving its build pipeline.

mod log_buffer;
mod pipeline;

// Re-export traits
pub use log_buffer::LogBufferService;

// Re-export implementations
pub use log_buffer::InMemoryLogBuffer;
pub use pipeline::{PipelineOrchestrator, StagePolicy};
