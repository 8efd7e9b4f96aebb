// Package module provides execution namespaces and their configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::unit::AttachmentKey;

/// Module configuration attached by the processing chain.
pub const MODULE_CONFIG: AttachmentKey<ModuleConfig> = AttachmentKey::new("deployment.module.config");

/// Identifier of a module (`deployment.app.war`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdentifier(String);

impl ModuleIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identifier used for a deployment's own module.
    pub fn for_deployment(deployment_name: &str) -> Self {
        Self(format!("deployment.{deployment_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ModuleConfig declares a module: its resource roots and the modules it imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    pub identifier: ModuleIdentifier,
    pub resource_roots: Vec<PathBuf>,
    pub dependencies: Vec<ModuleIdentifier>,
}

impl ModuleConfig {
    pub fn new(identifier: ModuleIdentifier) -> Self {
        Self {
            identifier,
            resource_roots: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resource_roots.push(root.into());
        self
    }

    pub fn with_dependency(mut self, identifier: ModuleIdentifier) -> Self {
        self.dependencies.push(identifier);
        self
    }
}

/// Module is a resolved, isolated execution namespace.
///
/// Resources resolve against the module's own roots first, then against its imports in
/// declaration order.
#[derive(Debug)]
pub struct Module {
    identifier: ModuleIdentifier,
    resource_roots: Vec<PathBuf>,
    imports: Vec<Arc<Module>>,
}

impl Module {
    pub(crate) fn new(config: &ModuleConfig, imports: Vec<Arc<Module>>) -> Self {
        Self {
            identifier: config.identifier.clone(),
            resource_roots: config.resource_roots.clone(),
            imports,
        }
    }

    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    pub fn resource_roots(&self) -> &[PathBuf] {
        &self.resource_roots
    }

    pub fn imports(&self) -> &[Arc<Module>] {
        &self.imports
    }

    /// Resolves a relative resource path to an existing file inside the namespace.
    pub fn resource(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            return None;
        }
        self.resource_roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.exists())
            .or_else(|| self.imports.iter().find_map(|m| m.resource(relative)))
    }
}
