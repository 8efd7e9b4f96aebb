// Package module provides the module loader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::module::{Module, ModuleConfig, ModuleIdentifier};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("module {0} is not known to the loader, its spec was likely never added")]
    NotFound(ModuleIdentifier),
    #[error("module {module} imports unknown module {dependency}")]
    MissingDependency {
        module: ModuleIdentifier,
        dependency: ModuleIdentifier,
    },
    #[error("module {0} imports itself through a cycle")]
    Cycle(ModuleIdentifier),
}

/// ModuleLoader turns module configurations into execution namespaces.
pub trait ModuleLoader: Send + Sync {
    /// Gets the loader id, unique per process.
    fn id(&self) -> u64;

    /// Registers a module spec so it can be loaded later.
    fn add_module_spec(&self, config: ModuleConfig);

    /// Loads (or returns the already loaded) module.
    fn load_module(&self, identifier: &ModuleIdentifier) -> Result<Arc<Module>, ResolutionError>;

    /// Forgets a module and its spec.
    fn remove_module(&self, identifier: &ModuleIdentifier);
}

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// DeploymentModuleLoader keeps specs added during processing and resolves them on demand.
pub struct DeploymentModuleLoader {
    id: u64,
    specs: DashMap<ModuleIdentifier, ModuleConfig>,
    loaded: DashMap<ModuleIdentifier, Arc<Module>>,
}

impl DeploymentModuleLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
            specs: DashMap::new(),
            loaded: DashMap::new(),
        })
    }

    fn resolve(
        &self,
        identifier: &ModuleIdentifier,
        path: &mut Vec<ModuleIdentifier>,
    ) -> Result<Arc<Module>, ResolutionError> {
        if let Some(module) = self.loaded.get(identifier) {
            return Ok(module.clone());
        }
        if path.contains(identifier) {
            return Err(ResolutionError::Cycle(identifier.clone()));
        }

        // Clone the spec out so no map guard is held across the recursion.
        let config = self
            .specs
            .get(identifier)
            .map(|spec| spec.value().clone())
            .ok_or_else(|| ResolutionError::NotFound(identifier.clone()))?;

        path.push(identifier.clone());
        let mut imports = Vec::with_capacity(config.dependencies.len());
        for dep in &config.dependencies {
            let module = self.resolve(dep, path).map_err(|e| match e {
                ResolutionError::NotFound(missing) if &missing == dep => ResolutionError::MissingDependency {
                    module: identifier.clone(),
                    dependency: missing,
                },
                other => other,
            })?;
            imports.push(module);
        }
        path.pop();

        let module = self
            .loaded
            .entry(identifier.clone())
            .or_insert_with(|| Arc::new(Module::new(&config, imports)))
            .clone();
        debug!(component = "module-loader", event = "module_loaded", loader = self.id, module = %identifier, "module loaded");
        Ok(module)
    }
}

impl ModuleLoader for DeploymentModuleLoader {
    fn id(&self) -> u64 {
        self.id
    }

    fn add_module_spec(&self, config: ModuleConfig) {
        debug!(component = "module-loader", event = "spec_added", loader = self.id, module = %config.identifier, "module spec added");
        // A new spec replaces whatever was loaded from the previous one (redeploy).
        self.loaded.remove(&config.identifier);
        self.specs.insert(config.identifier.clone(), config);
    }

    fn load_module(&self, identifier: &ModuleIdentifier) -> Result<Arc<Module>, ResolutionError> {
        self.resolve(identifier, &mut Vec::new())
    }

    fn remove_module(&self, identifier: &ModuleIdentifier) {
        self.loaded.remove(identifier);
        self.specs.remove(identifier);
        debug!(component = "module-loader", event = "module_removed", loader = self.id, module = %identifier, "module removed");
    }
}
