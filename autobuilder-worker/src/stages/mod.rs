//! Pipeline stage adapters
//!
//! Thin wrappers around the external build operations. Each adapter turns a
//! job into command lines, runs them through the job context and folds the
//! outcome into a [`StageResult`]. Adapters never return errors: failures are
//! logged in full to the job context and reported with a fixed message.

mod html;
mod oas;
mod parse;
mod persist;
mod prepare;
mod publish;
pub mod workspace;

pub use html::HtmlStage;
pub use oas::OasPageStage;
pub use parse::ParseStage;
pub use persist::PersistStage;
pub use prepare::PrepareStage;
pub use publish::{DeployStage, StagingStage};

use async_trait::async_trait;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::stage::{StageKind, StageResult};

use crate::config::ToolConfig;
use crate::context::JobContext;

/// One step of the build pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn run(&self, job: &Job, context: &JobContext) -> StageResult;
}

/// The standard stages in execution order
pub fn standard_stages(tools: &ToolConfig) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(PrepareStage::new(tools.clone())),
        Box::new(ParseStage::new(tools.clone())),
        Box::new(PersistStage::new(tools.clone())),
        Box::new(HtmlStage::new(tools.clone())),
        Box::new(OasPageStage::new(tools.clone())),
        Box::new(StagingStage::new(tools.clone())),
        Box::new(DeployStage::new(tools.clone())),
    ]
}

/// Logs the full error and returns the fixed failure result for `kind`
fn execution_failed(kind: StageKind, context: &JobContext, error: &anyhow::Error) -> StageResult {
    let message = format!("Failed in {}", kind);
    context.log_error(format!("{}: {:#}", message, error));
    StageResult::failed(message.clone(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_stage_order() {
        let kinds: Vec<_> = standard_stages(&ToolConfig::default())
            .iter()
            .map(|stage| stage.kind())
            .collect();
        assert_eq!(kinds, StageKind::ALL.to_vec());
    }
}
