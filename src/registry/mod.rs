//! Dependency-ordered service registry.

pub mod api;
pub mod batch;
pub mod container;
mod controller;
pub mod error;
pub mod listener;
pub mod name;
pub mod service;

#[cfg(test)]
mod container_test;

// Re-export main types
pub use api::{PostHook, ServiceHandle, ServiceRegistry};
pub use batch::{Batch, Dependency, InjectorBinding, ServiceDescriptor, SubBatch};
pub use container::ServiceContainer;
pub use error::RegistrationError;
pub use listener::ServiceListener;
pub use name::{ServiceName, ROOT};
pub use service::{Mode, Service, ServiceState, ServiceValue, StartError};
