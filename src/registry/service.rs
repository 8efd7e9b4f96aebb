// Package registry provides the service behavior interface.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use super::name::ServiceName;

/// Value a started service exposes to its dependents (read through injector bindings).
pub type ServiceValue = Arc<dyn Any + Send + Sync>;

/// Start mode requested for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Started as soon as the batch is installed.
    Immediate,
    /// Started only when a dependent is being started.
    OnDemand,
}

/// Per-service start failure, reported through listeners and never raised to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("{0}")]
    Failed(String),
    #[error("dependency {0} failed to start")]
    DependencyFailed(ServiceName),
    #[error("dependency {0} is gone")]
    DependencyGone(ServiceName),
    #[error("service {0} was removed before it started")]
    Removed(ServiceName),
    #[error("injection of {property} failed: {reason}")]
    Injection { property: &'static str, reason: String },
}

impl StartError {
    /// Creates a plain start failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Creates an injection failure for the given binding property.
    pub fn injection(property: &'static str, reason: impl Into<String>) -> Self {
        Self::Injection {
            property,
            reason: reason.into(),
        }
    }
}

/// Lifecycle state of an installed service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Down,
    Starting,
    Up,
    Failed(StartError),
    Removed,
}

impl ServiceState {
    /// Checks whether the service reached a state it will not leave on its own.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Up | Self::Failed(_) | Self::Removed)
    }
}

/// Service is the behavior object of a descriptor (mount, deployment unit, item service, ...).
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Starts the service. All dependencies are up and injected when this is called.
    async fn start(&self, name: &ServiceName) -> Result<(), StartError>;

    /// Stops the service. Dependents are already stopped when this is called.
    async fn stop(&self, name: &ServiceName);

    /// Gets the value exposed to dependents.
    fn value(&self) -> Option<ServiceValue> {
        None
    }
}
