#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::mount::{mount_service_name, MountHandle, MountService, TempFileProvider};
    use crate::registry::Service;

    #[test]
    fn test_mount_service_name() {
        assert_eq!(mount_service_name("app.war").to_string(), "deployd.mounts.app.war");
        assert_eq!(mount_service_name("app.war").simple_name(), "app.war");
    }

    #[tokio::test]
    async fn test_directory_mounted_in_place() {
        let deployments = TempDir::new().expect("tempdir");
        let root = deployments.path().join("app.war");
        fs::create_dir(&root).expect("mkdir");

        let temp = TempFileProvider::create(None).expect("provider");
        let mount = MountService::new(&root, temp, true);
        let name = mount_service_name("app.war");
        assert!(mount.value().is_none());

        mount.start(&name).await.expect("mounted");
        let value = mount.value().expect("value");
        let handle = value.downcast_ref::<MountHandle>().expect("mount handle");
        assert_eq!(handle.root(), root.as_path());
        assert!(!handle.is_staged());

        mount.stop(&name).await;
        assert!(mount.value().is_none());
        assert!(root.exists(), "in-place mounts leave the artifact alone");
    }

    #[tokio::test]
    async fn test_archive_staged_into_temp_dir() {
        let deployments = TempDir::new().expect("tempdir");
        let scratch = TempDir::new().expect("tempdir");
        let root = deployments.path().join("app.jar");
        fs::write(&root, b"archive bytes").expect("write");

        let temp = TempFileProvider::create(Some(scratch.path())).expect("provider");
        assert!(temp.path().starts_with(scratch.path()));

        let mount = MountService::new(&root, temp.clone(), true);
        let name = mount_service_name("app.jar");
        mount.start(&name).await.expect("mounted");

        let value = mount.value().expect("value");
        let handle = value.downcast_ref::<MountHandle>().expect("mount handle");
        assert!(handle.is_staged());
        assert!(handle.root().starts_with(temp.path()));

        let staged = handle.root().join("app.jar");
        assert_eq!(fs::read(&staged).expect("read"), b"archive bytes");
        assert!(fs::metadata(&staged).expect("meta").permissions().readonly());

        let staging_dir = handle.root().to_path_buf();
        mount.stop(&name).await;
        assert!(!staging_dir.exists());
        assert!(root.exists());
    }

    #[tokio::test]
    async fn test_missing_root_fails_start() {
        let deployments = TempDir::new().expect("tempdir");
        let temp = TempFileProvider::create(None).expect("provider");
        let mount = MountService::new(deployments.path().join("absent.war"), temp, false);

        let err = mount.start(&mount_service_name("absent.war")).await.unwrap_err();
        assert!(err.to_string().contains("absent.war"));
        assert!(mount.value().is_none());
    }

    #[test]
    fn test_provider_close_removes_dir() {
        let temp = TempFileProvider::create(None).expect("provider");
        let path = temp.path().to_path_buf();
        assert!(path.exists());

        let temp = Arc::try_unwrap(temp).expect("sole owner");
        assert_eq!(temp.close().expect("closed"), path);
        assert!(!path.exists());
    }
}
