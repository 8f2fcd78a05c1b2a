//! Repository layer
//!
//! Repositories are thin clients for the worker's external collaborators:
//! the job queue, the task-protection signal, the job store, the
//! repository metadata service and build dependency downloads. They carry
//! no business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod dependencies;
mod endpoint;
mod jobs;
mod metadata;
mod protection;
mod queue;

// Re-export traits
pub use dependencies::DependencyFetcher;
pub use jobs::{JobSink, JobStore};
pub use metadata::{RepoBranches, RepoMetadataRepository};
pub use protection::TaskProtection;
pub use queue::JobQueue;

// Re-export implementations
pub use dependencies::HttpDependencyFetcher;
pub use jobs::{HttpJobRepository, QueueJobSink};
pub use metadata::{HttpRepoMetadataRepository, StaticRepoMetadata};
pub use protection::{EcsTaskProtection, NoopTaskProtection};
pub use queue::SqsJobQueue;
