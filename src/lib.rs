//! deployd: a deployment orchestration engine.
//!
//! Artifact roots go through mount, processing, module resolution and service installation
//! on top of a dependency-ordered service registry.

pub mod app;
pub mod chain;
pub mod config;
pub mod deployment;
pub mod item;
pub mod metrics;
pub mod module;
pub mod mount;
pub mod registry;
pub mod shutdown;
pub mod unit;
