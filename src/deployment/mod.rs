//! Deployment orchestration: phases, completion aggregation and the caller-facing manager.

pub mod error;
pub mod future;
pub mod listener;
pub mod manager;
pub mod result;
pub mod service;

#[cfg(test)]
mod future_test;

pub use error::DeploymentError;
pub use future::{AlreadyResolvedError, DeploymentFuture};
pub use listener::{BatchSummary, Completion, DeploymentServiceListener};
pub use manager::{DeploymentManager, UndeployHook};
pub use result::{DeploymentResult, DeploymentStatus};
pub use service::{
    deployment_service_name, DeploymentService, DEPLOYMENT_CHAIN_PROPERTY, DEPLOYMENT_SERVICE_NAME,
    MODULE_LOADER_PROPERTY, MOUNT_PROPERTY,
};
