// Package app wires the registry, the deployment manager and configuration together.

#[allow(clippy::module_inception)]
pub mod app;

pub use app::{chain_provider, loader_provider, App};
