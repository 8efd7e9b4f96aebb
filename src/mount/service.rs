// Package mount provides the mount service exposing an artifact's content as a directory.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::registry::{Service, ServiceName, ServiceValue, StartError, ROOT};

use super::temp::TempFileProvider;

/// Parent name of every mount service (`deployd.mounts.<name>`).
pub static MOUNT_SERVICE_NAME: Lazy<ServiceName> = Lazy::new(|| ROOT.append("mounts"));

/// Gets the mount service name for a deployment.
pub fn mount_service_name(deployment_name: &str) -> ServiceName {
    MOUNT_SERVICE_NAME.append(deployment_name)
}

/// MountHandle is the value a started mount exposes to its dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountHandle {
    root: PathBuf,
    staged: bool,
}

impl MountHandle {
    /// Directory holding the artifact's content.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the content was copied into scratch space rather than used in place.
    pub fn is_staged(&self) -> bool {
        self.staged
    }
}

struct Mounted {
    handle: MountHandle,
    staging: Option<TempDir>,
}

/// MountService mounts an artifact root. Directories are exposed in place; single-file
/// archives are staged into a directory of the temp-file provider.
pub struct MountService {
    path: PathBuf,
    temp_files: Arc<TempFileProvider>,
    read_only: bool,
    mounted: Mutex<Option<Mounted>>,
}

impl MountService {
    pub fn new(path: impl Into<PathBuf>, temp_files: Arc<TempFileProvider>, read_only: bool) -> Self {
        Self {
            path: path.into(),
            temp_files,
            read_only,
            mounted: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn stage(&self, name: &ServiceName) -> std::io::Result<Mounted> {
        let meta = tokio::fs::metadata(&self.path).await?;
        if meta.is_dir() {
            return Ok(Mounted {
                handle: MountHandle {
                    root: self.path.clone(),
                    staged: false,
                },
                staging: None,
            });
        }

        let staging = self.temp_files.staging_dir(name.simple_name())?;
        let file_name = self
            .path
            .file_name()
            .unwrap_or_else(|| OsStr::new(name.simple_name()));
        let target = staging.path().join(file_name);
        tokio::fs::copy(&self.path, &target).await?;

        if self.read_only {
            let mut perms = tokio::fs::metadata(&target).await?.permissions();
            perms.set_readonly(true);
            tokio::fs::set_permissions(&target, perms).await?;
        }

        Ok(Mounted {
            handle: MountHandle {
                root: staging.path().to_path_buf(),
                staged: true,
            },
            staging: Some(staging),
        })
    }
}

#[async_trait]
impl Service for MountService {
    async fn start(&self, name: &ServiceName) -> Result<(), StartError> {
        let mounted = self
            .stage(name)
            .await
            .map_err(|e| StartError::failed(format!("failed to mount {}: {e}", self.path.display())))?;

        info!(
            component = "mount",
            event = "mounted",
            service = %name,
            path = %self.path.display(),
            root = %mounted.handle.root.display(),
            staged = mounted.handle.staged,
            "artifact mounted"
        );
        *self.mounted.lock() = Some(mounted);
        Ok(())
    }

    async fn stop(&self, name: &ServiceName) {
        let Some(mounted) = self.mounted.lock().take() else {
            return;
        };
        if let Some(staging) = mounted.staging {
            let path = staging.path().to_path_buf();
            if let Err(e) = staging.close() {
                debug!(component = "mount", event = "unmount_error", service = %name, path = %path.display(), error = %e, "failed to remove staging dir");
            }
        }
        info!(component = "mount", event = "unmounted", service = %name, path = %self.path.display(), "artifact unmounted");
    }

    fn value(&self) -> Option<ServiceValue> {
        self.mounted
            .lock()
            .as_ref()
            .map(|m| Arc::new(m.handle.clone()) as ServiceValue)
    }
}
