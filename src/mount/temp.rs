// Package mount provides the scoped temp-resource provider.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{Builder, TempDir};
use tracing::info;

/// TempFileProvider owns a scratch directory mounts stage their content under.
///
/// The directory is removed when the last holder drops the provider.
#[derive(Debug)]
pub struct TempFileProvider {
    dir: TempDir,
}

impl TempFileProvider {
    /// Creates the scratch directory under `base`, or under the system temp dir.
    pub fn create(base: Option<&Path>) -> io::Result<Arc<Self>> {
        let mut builder = Builder::new();
        builder.prefix("deployd-");
        let dir = match base {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };
        info!(component = "mount", event = "temp_provider_created", path = %dir.path().display(), "temp file provider created");
        Ok(Arc::new(Self { dir }))
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates a fresh staging directory for the named mount.
    pub fn staging_dir(&self, name: &str) -> io::Result<TempDir> {
        Builder::new().prefix(&format!("{name}-")).tempdir_in(self.dir.path())
    }

    /// Removes the scratch directory now, reporting any error.
    pub fn close(self) -> io::Result<PathBuf> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        info!(component = "mount", event = "temp_provider_closed", path = %path.display(), "temp file provider closed");
        Ok(path)
    }
}
