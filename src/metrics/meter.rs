use crate::deployment::DeploymentResult;

// Metric name constants
pub const DEPLOYMENTS_TOTAL: &str = "deployments_total";
pub const DEPLOYMENTS_FAILED: &str = "deployments_failed_total";
pub const DEPLOYMENT_SERVICES: &str = "deployment_services_total";
pub const DEPLOYMENT_DURATION: &str = "deployment_duration_ms";
pub const UNDEPLOYMENTS_TOTAL: &str = "undeployments_total";

/// Records the outcome of one deployment request.
pub fn record_deployment(result: &DeploymentResult) {
    metrics::counter!(DEPLOYMENTS_TOTAL).increment(1);
    metrics::counter!(DEPLOYMENT_SERVICES).increment(result.service_count() as u64);
    metrics::histogram!(DEPLOYMENT_DURATION).record(result.elapsed_millis() as f64);
    if let Some(cause) = result.cause() {
        metrics::counter!(DEPLOYMENTS_FAILED, "cause" => cause.kind()).increment(1);
    }
}

/// Adds undeployed roots.
pub fn add_undeployments(value: u64) {
    metrics::counter!(UNDEPLOYMENTS_TOTAL).increment(value);
}
