// Package mount provides the archive mount facility.

pub mod service;
pub mod temp;

#[cfg(test)]
mod mount_test;

pub use service::{mount_service_name, MountHandle, MountService, MOUNT_SERVICE_NAME};
pub use temp::TempFileProvider;
