// Package chain provides the stage declaring a deployment's own module.

use crate::module::{ModuleConfig, ModuleIdentifier, MODULE_CONFIG};

use super::processor::{DeploymentProcessor, ProcessingContext, ProcessingError};

/// Priority of the module declaration stage.
pub const MODULE_CONFIG_PRIORITY: u32 = 0x0800;

/// ModuleConfigProcessor declares a module rooted at the artifact's content and registers it with
/// the artifact's module loader. Modules listed in `imports` become its dependencies.
#[derive(Debug, Default, Clone)]
pub struct ModuleConfigProcessor {
    imports: Vec<ModuleIdentifier>,
}

impl ModuleConfigProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_import(mut self, identifier: ModuleIdentifier) -> Self {
        self.imports.push(identifier);
        self
    }
}

impl DeploymentProcessor for ModuleConfigProcessor {
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<(), ProcessingError> {
        let root = ctx
            .unit()
            .content_root()
            .cloned()
            .ok_or_else(|| ProcessingError::new("module-config", "deployment root is not attached"))?;

        let config = self.imports.iter().cloned().fold(
            ModuleConfig::new(ModuleIdentifier::for_deployment(ctx.deployment_name())).with_resource_root(root),
            ModuleConfig::with_dependency,
        );

        ctx.module_loader().add_module_spec(config.clone());
        ctx.unit_mut().put(MODULE_CONFIG, config);
        Ok(())
    }
}
