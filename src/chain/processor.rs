// Package chain provides the processing stage interface.

use std::sync::Arc;

use crate::module::ModuleLoader;
use crate::unit::UnitContext;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage {stage} failed: {message}")]
pub struct ProcessingError {
    pub stage: String,
    pub message: String,
}

impl ProcessingError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// DeploymentProcessor is one stage of a processing chain.
pub trait DeploymentProcessor: Send + Sync {
    /// Reads and writes the artifact's attachments. An error aborts the chain.
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<(), ProcessingError>;
}

impl<F> DeploymentProcessor for F
where
    F: Fn(&mut ProcessingContext<'_>) -> Result<(), ProcessingError> + Send + Sync,
{
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<(), ProcessingError> {
        self(ctx)
    }
}

/// ProcessingContext is what a stage sees of one artifact: its unit context and the
/// module loader selected for its root.
pub struct ProcessingContext<'a> {
    unit: &'a mut UnitContext,
    module_loader: &'a Arc<dyn ModuleLoader>,
}

impl<'a> ProcessingContext<'a> {
    pub fn new(unit: &'a mut UnitContext, module_loader: &'a Arc<dyn ModuleLoader>) -> Self {
        Self { unit, module_loader }
    }

    pub fn deployment_name(&self) -> &str {
        self.unit.name()
    }

    pub fn unit(&self) -> &UnitContext {
        self.unit
    }

    pub fn unit_mut(&mut self) -> &mut UnitContext {
        self.unit
    }

    /// Gets the module loader in effect for the artifact being processed.
    pub fn module_loader(&self) -> &Arc<dyn ModuleLoader> {
        self.module_loader
    }
}
