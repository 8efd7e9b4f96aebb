//! Deployment items: work discovered while processing an artifact, installed once its
//! module is resolved.

use std::sync::Arc;

use crate::module::{Module, ModuleLoader};
use crate::registry::{ServiceDescriptor, ServiceName, SubBatch};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("item {item} failed to install: {message}")]
pub struct ItemInstallError {
    pub item: String,
    pub message: String,
}

impl ItemInstallError {
    pub fn new(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            message: message.into(),
        }
    }
}

/// DeploymentItem installs itself against the item context of its artifact.
pub trait DeploymentItem: Send + Sync {
    /// Installs the item. Services added to the context start after the artifact's
    /// deployment-unit service.
    fn install(&self, ctx: &mut ItemContext<'_>) -> Result<(), ItemInstallError>;
}

/// ItemContext exposes the resolved module and the sub-batch being assembled for one artifact.
pub struct ItemContext<'a> {
    deployment_name: &'a str,
    deployment_service: &'a ServiceName,
    module: Option<&'a Arc<Module>>,
    module_loader: &'a Arc<dyn ModuleLoader>,
    batch: &'a mut SubBatch,
}

impl<'a> ItemContext<'a> {
    pub fn new(
        deployment_name: &'a str,
        deployment_service: &'a ServiceName,
        module: Option<&'a Arc<Module>>,
        module_loader: &'a Arc<dyn ModuleLoader>,
        batch: &'a mut SubBatch,
    ) -> Self {
        Self {
            deployment_name,
            deployment_service,
            module,
            module_loader,
            batch,
        }
    }

    pub fn deployment_name(&self) -> &str {
        self.deployment_name
    }

    /// Name of the deployment-unit service every added service depends on.
    pub fn deployment_service(&self) -> &ServiceName {
        self.deployment_service
    }

    /// Gets the resolved execution namespace, if the artifact declared one.
    pub fn module(&self) -> Option<&Arc<Module>> {
        self.module
    }

    /// Gets the module loader the artifact was processed with.
    pub fn module_loader(&self) -> &Arc<dyn ModuleLoader> {
        self.module_loader
    }

    /// Adds a service to the artifact's sub-batch.
    pub fn add_service(&mut self, descriptor: ServiceDescriptor) {
        self.batch.add_service(descriptor);
    }

    /// Gets the number of services added so far.
    pub fn service_count(&self) -> usize {
        self.batch.len()
    }
}
