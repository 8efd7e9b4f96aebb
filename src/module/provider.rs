// Package module provides the module-loader provider service.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::registry::{Service, ServiceName, ServiceValue, StartError, ROOT};

use super::loader::{DeploymentModuleLoader, ModuleLoader};

/// Name of the provider service every deployment unit depends on.
pub static MODULE_LOADER_PROVIDER_SERVICE_NAME: Lazy<ServiceName> =
    Lazy::new(|| ROOT.append("deployment").append("module").append("loader").append("provider"));

/// ModuleLoaderProvider selects the module loader used for an artifact root.
///
/// Selectors match the root's file name and are tried in registration order; roots no
/// selector matches get the default loader.
#[derive(Clone)]
pub struct ModuleLoaderProvider {
    default: Arc<dyn ModuleLoader>,
    selectors: Arc<Vec<(Regex, Arc<dyn ModuleLoader>)>>,
}

impl ModuleLoaderProvider {
    pub fn new(default: Arc<dyn ModuleLoader>) -> Self {
        Self {
            default,
            selectors: Arc::new(Vec::new()),
        }
    }

    /// Routes roots whose file name matches `pattern` to `loader`.
    pub fn with_loader(mut self, pattern: Regex, loader: Arc<dyn ModuleLoader>) -> Self {
        Arc::make_mut(&mut self.selectors).push((pattern, loader));
        self
    }

    /// Routes roots matching `pattern` to a fresh, dedicated loader.
    pub fn with_dedicated_loader(self, pattern: Regex) -> Self {
        self.with_loader(pattern, DeploymentModuleLoader::new())
    }

    /// Gets the loader for the given artifact root.
    pub fn loader_for(&self, root: &Path) -> Arc<dyn ModuleLoader> {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.selectors
            .iter()
            .find(|(pattern, _)| pattern.is_match(&name))
            .map(|(_, loader)| loader.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for ModuleLoaderProvider {
    fn default() -> Self {
        Self::new(DeploymentModuleLoader::new())
    }
}

#[async_trait]
impl Service for ModuleLoaderProvider {
    async fn start(&self, name: &ServiceName) -> Result<(), StartError> {
        info!(
            component = "module-loader",
            event = "provider_started",
            service = %name,
            selectors = self.selectors.len(),
            default_loader = self.default.id(),
            "module loader provider started"
        );
        Ok(())
    }

    async fn stop(&self, name: &ServiceName) {
        info!(component = "module-loader", event = "provider_stopped", service = %name, "module loader provider stopped");
    }

    fn value(&self) -> Option<ServiceValue> {
        Some(Arc::new(self.clone()))
    }
}
