// Package deployment provides the deployment-unit service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::chain::DeploymentChain;
use crate::module::{ModuleIdentifier, ModuleLoader};
use crate::mount::MountHandle;
use crate::registry::{Service, ServiceName, StartError, ROOT};

/// Parent name of every deployment-unit service (`deployd.deployment.unit.<name>`).
pub static DEPLOYMENT_SERVICE_NAME: Lazy<ServiceName> =
    Lazy::new(|| ROOT.append("deployment").append("unit"));

/// Binding property receiving the processing chain.
pub const DEPLOYMENT_CHAIN_PROPERTY: &str = "deploymentChain";
/// Binding property receiving the module loader.
pub const MODULE_LOADER_PROPERTY: &str = "moduleLoader";
/// Binding property receiving the mount.
pub const MOUNT_PROPERTY: &str = "mount";

pub fn deployment_service_name(deployment_name: &str) -> ServiceName {
    DEPLOYMENT_SERVICE_NAME.append(deployment_name)
}

/// DeploymentService is the deployment-unit behavior of one artifact. Its dependencies
/// inject the chain, the module loader and the mount selected for the artifact's root.
pub struct DeploymentService {
    name: String,
    root: PathBuf,
    chain: RwLock<Option<Arc<DeploymentChain>>>,
    module_loader: RwLock<Option<Arc<dyn ModuleLoader>>>,
    mount: RwLock<Option<MountHandle>>,
    module: RwLock<Option<ModuleIdentifier>>,
}

impl DeploymentService {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            chain: RwLock::new(None),
            module_loader: RwLock::new(None),
            mount: RwLock::new(None),
            module: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn set_chain(&self, chain: Arc<DeploymentChain>) {
        *self.chain.write() = Some(chain);
    }

    pub fn chain(&self) -> Option<Arc<DeploymentChain>> {
        self.chain.read().clone()
    }

    pub fn set_module_loader(&self, loader: Arc<dyn ModuleLoader>) {
        *self.module_loader.write() = Some(loader);
    }

    pub fn module_loader(&self) -> Option<Arc<dyn ModuleLoader>> {
        self.module_loader.read().clone()
    }

    pub fn set_mount(&self, mount: MountHandle) {
        *self.mount.write() = Some(mount);
    }

    pub fn mount(&self) -> Option<MountHandle> {
        self.mount.read().clone()
    }

    /// Records the module declared for the artifact so its loader forgets it on stop.
    pub(crate) fn set_module(&self, identifier: ModuleIdentifier) {
        *self.module.write() = Some(identifier);
    }
}

#[async_trait]
impl Service for DeploymentService {
    async fn start(&self, name: &ServiceName) -> Result<(), StartError> {
        if self.chain.read().is_none() {
            return Err(StartError::injection(DEPLOYMENT_CHAIN_PROPERTY, "no chain injected"));
        }
        if self.module_loader.read().is_none() {
            return Err(StartError::injection(MODULE_LOADER_PROPERTY, "no module loader injected"));
        }
        info!(
            component = "deployment",
            event = "unit_started",
            service = %name,
            root = %self.root.display(),
            "deployment unit started"
        );
        Ok(())
    }

    async fn stop(&self, name: &ServiceName) {
        let module = self.module.write().take();
        if let (Some(module), Some(loader)) = (module, self.module_loader.read().clone()) {
            loader.remove_module(&module);
        }
        info!(component = "deployment", event = "unit_stopped", service = %name, "deployment unit stopped");
    }
}
