// Package module provides module configuration, resolution and per-root loader selection.

pub mod loader;
#[allow(clippy::module_inception)]
pub mod module;
pub mod provider;

#[cfg(test)]
mod loader_test;

pub use loader::{DeploymentModuleLoader, ModuleLoader, ResolutionError};
pub use module::{Module, ModuleConfig, ModuleIdentifier, MODULE_CONFIG};
pub use provider::{ModuleLoaderProvider, MODULE_LOADER_PROVIDER_SERVICE_NAME};
