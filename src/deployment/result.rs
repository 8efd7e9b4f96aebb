// Package deployment provides the deployment result.

use std::collections::{BTreeMap, HashMap};

use serde::{Serialize, Serializer};

use crate::registry::{ServiceName, StartError};

use super::error::DeploymentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Failure,
}

/// DeploymentResult is the immutable outcome of one deployment request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentResult {
    status: DeploymentStatus,
    #[serde(serialize_with = "serialize_cause", skip_serializing_if = "Option::is_none")]
    cause: Option<DeploymentError>,
    #[serde(serialize_with = "serialize_failures")]
    failures: HashMap<ServiceName, StartError>,
    elapsed_millis: u64,
    service_count: usize,
}

impl DeploymentResult {
    pub(crate) fn success(elapsed_millis: u64, service_count: usize) -> Self {
        Self {
            status: DeploymentStatus::Success,
            cause: None,
            failures: HashMap::new(),
            elapsed_millis,
            service_count,
        }
    }

    pub(crate) fn failure(
        cause: DeploymentError,
        failures: HashMap<ServiceName, StartError>,
        elapsed_millis: u64,
        service_count: usize,
    ) -> Self {
        Self {
            status: DeploymentStatus::Failure,
            cause: Some(cause),
            failures,
            elapsed_millis,
            service_count,
        }
    }

    /// Failure raised before anything was submitted to the registry.
    pub(crate) fn rejected(cause: DeploymentError) -> Self {
        Self::failure(cause, HashMap::new(), 0, 0)
    }

    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }

    pub fn cause(&self) -> Option<&DeploymentError> {
        self.cause.as_ref()
    }

    /// Gets the services that failed to start, with their causes.
    pub fn failures(&self) -> &HashMap<ServiceName, StartError> {
        &self.failures
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed_millis
    }

    /// Gets the number of services the deployment installed.
    pub fn service_count(&self) -> usize {
        self.service_count
    }

    /// Converts into a `Result`, for callers that want to use `?`.
    pub fn into_result(self) -> Result<Self, DeploymentError> {
        match self.status {
            DeploymentStatus::Success => Ok(self),
            DeploymentStatus::Failure => Err(self
                .cause
                .unwrap_or(DeploymentError::ServicesFailed(self.failures.len()))),
        }
    }
}

fn serialize_cause<S: Serializer>(cause: &Option<DeploymentError>, s: S) -> Result<S::Ok, S::Error> {
    match cause {
        Some(cause) => s.collect_str(cause),
        None => s.serialize_none(),
    }
}

fn serialize_failures<S: Serializer>(failures: &HashMap<ServiceName, StartError>, s: S) -> Result<S::Ok, S::Error> {
    let sorted: BTreeMap<String, String> = failures
        .iter()
        .map(|(name, cause)| (name.to_string(), cause.to_string()))
        .collect();
    sorted.serialize(s)
}
