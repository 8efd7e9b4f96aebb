// Package deployment provides deployment errors.

use std::path::PathBuf;

use crate::chain::ProcessingError;
use crate::item::ItemInstallError;
use crate::module::ResolutionError;
use crate::registry::RegistrationError;

/// DeploymentError is the cause carried by a failed deployment result, and the error
/// returned by undeploy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeploymentError {
    #[error("deployment root {} does not exist", .0.display())]
    RootNotFound(PathBuf),
    #[error("registry rejected the batch: {0}")]
    Registration(#[from] RegistrationError),
    #[error("processing of {deployment} failed: {source}")]
    Processing {
        deployment: String,
        #[source]
        source: ProcessingError,
    },
    #[error("module resolution for {deployment} failed: {source}")]
    Resolution {
        deployment: String,
        #[source]
        source: ResolutionError,
    },
    #[error("installing items of {deployment} failed: {source}")]
    ItemInstall {
        deployment: String,
        #[source]
        source: ItemInstallError,
    },
    #[error("{0} service(s) failed to start")]
    ServicesFailed(usize),
    #[error("{0} is not deployed")]
    NotDeployed(String),
    #[error("{0}")]
    Internal(String),
}

impl DeploymentError {
    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable kind, used as a metrics label and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RootNotFound(_) => "root_not_found",
            Self::Registration(_) => "registration",
            Self::Processing { .. } => "processing",
            Self::Resolution { .. } => "resolution",
            Self::ItemInstall { .. } => "item_install",
            Self::ServicesFailed(_) => "services_failed",
            Self::NotDeployed(_) => "not_deployed",
            Self::Internal(_) => "internal",
        }
    }
}
