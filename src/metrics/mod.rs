//! Prometheus metrics functionality.
//
//! Metrics organization:
//! - Deployment metrics: metrics::meter (deployments_total, deployment_duration_ms, etc.)
//! - Exporter: installed by `main` when `metrics.enabled` is set.

pub mod meter;

// Re-export commonly used items
pub use meter::*;
