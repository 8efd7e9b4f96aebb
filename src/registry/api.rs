// Package registry provides the ServiceRegistry interface.

use std::sync::Arc;

use async_trait::async_trait;

use super::batch::Batch;
use super::error::RegistrationError;
use super::name::ServiceName;
use super::service::{Mode, ServiceState, ServiceValue};

/// Hook run once a coordinated stop has completed.
pub type PostHook = Box<dyn FnOnce() + Send>;

/// Read-only view of an installed service.
pub trait ServiceHandle: Send + Sync {
    fn name(&self) -> &ServiceName;

    fn mode(&self) -> Mode;

    /// Gets the current lifecycle state.
    fn state(&self) -> ServiceState;

    /// Gets the value of the service, if it is up and exposes one.
    fn value(&self) -> Option<ServiceValue>;
}

/// ServiceRegistry is a dependency-respecting graph executor.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Installs a batch atomically: either every descriptor is accepted or none is.
    fn install(&self, batch: Batch) -> Result<(), RegistrationError>;

    /// Looks up an installed service by name.
    fn lookup(&self, name: &ServiceName) -> Option<Arc<dyn ServiceHandle>>;

    /// Stops and removes the given services as one unit, dependents first, then runs `post_hook`.
    async fn stop_all(&self, names: Vec<ServiceName>, post_hook: PostHook);
}
