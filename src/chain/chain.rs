// Package chain provides the ordered processing chain.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::processor::{DeploymentProcessor, ProcessingContext, ProcessingError};

struct Stage {
    priority: u32,
    name: String,
    processor: Arc<dyn DeploymentProcessor>,
}

/// DeploymentChain runs its stages in ascending priority; stages of equal priority keep
/// insertion order.
pub struct DeploymentChain {
    name: String,
    stages: Vec<Stage>,
}

impl DeploymentChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_processor(
        mut self,
        priority: u32,
        name: impl Into<String>,
        processor: Arc<dyn DeploymentProcessor>,
    ) -> Self {
        let at = self.stages.partition_point(|s| s.priority <= priority);
        self.stages.insert(
            at,
            Stage {
                priority,
                name: name.into(),
                processor,
            },
        );
        self
    }

    /// Gets the stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage against the context, stopping at the first failure.
    pub fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<(), ProcessingError> {
        for stage in &self.stages {
            debug!(
                component = "chain",
                event = "stage",
                chain = %self.name,
                stage = %stage.name,
                deployment = %ctx.deployment_name(),
                "running stage"
            );
            stage.processor.process(ctx)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DeploymentChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentChain")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish()
    }
}
