// Package registry provides the batch listener interface.

use super::name::ServiceName;
use super::service::StartError;

/// ServiceListener observes the services of the batches it was attached to.
///
/// Every service reports `service_added` once, before any service of the batch is started,
/// and then exactly one of `service_started`, `service_failed` or `service_passive`.
pub trait ServiceListener: Send + Sync {
    /// A service of the batch was accepted by the registry.
    fn service_added(&self, _name: &ServiceName) {}

    /// A service of the batch is up.
    fn service_started(&self, _name: &ServiceName) {}

    /// A service of the batch failed to start.
    fn service_failed(&self, _name: &ServiceName, _cause: &StartError) {}

    /// An on-demand service of the batch was installed without anything demanding it.
    fn service_passive(&self, _name: &ServiceName) {}

    /// A service of the batch was stopped and removed.
    fn service_removed(&self, _name: &ServiceName) {}
}
