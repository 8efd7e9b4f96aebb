// Package chain provides processing stages, chains and the per-root chain provider.

#[allow(clippy::module_inception)]
pub mod chain;
pub mod module_config;
pub mod processor;
pub mod provider;


pub use chain::DeploymentChain;
pub use module_config::{ModuleConfigProcessor, MODULE_CONFIG_PRIORITY};
pub use processor::{DeploymentProcessor, ProcessingContext, ProcessingError};
pub use provider::{DeploymentChainProvider, CHAIN_PROVIDER_SERVICE_NAME};
