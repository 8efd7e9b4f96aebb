// Errors raised by the registry when a batch is rejected.

use super::name::ServiceName;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("duplicate service name {0}")]
    DuplicateService(ServiceName),
    #[error("service {service} depends on {dependency}, which is not installed")]
    MissingDependency {
        service: ServiceName,
        dependency: ServiceName,
    },
    #[error("cyclic dependency detected at {0}")]
    CyclicDependency(ServiceName),
}
