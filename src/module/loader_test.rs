#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use regex::Regex;
    use tempfile::TempDir;

    use crate::module::{
        DeploymentModuleLoader, ModuleConfig, ModuleIdentifier, ModuleLoader, ModuleLoaderProvider,
        ResolutionError,
    };

    fn id(name: &str) -> ModuleIdentifier {
        ModuleIdentifier::new(name)
    }

    #[test]
    fn test_load_unknown_module() {
        let loader = DeploymentModuleLoader::new();
        assert_eq!(
            loader.load_module(&id("deployment.app.war")).unwrap_err(),
            ResolutionError::NotFound(id("deployment.app.war"))
        );
    }

    #[test]
    fn test_load_caches_module() {
        let loader = DeploymentModuleLoader::new();
        loader.add_module_spec(ModuleConfig::new(id("deployment.app.war")));

        let first = loader.load_module(&id("deployment.app.war")).expect("loads");
        let second = loader.load_module(&id("deployment.app.war")).expect("loads");
        assert!(Arc::ptr_eq(&first, &second));

        // A new spec for the same identifier invalidates the loaded module.
        loader.add_module_spec(ModuleConfig::new(id("deployment.app.war")).with_resource_root("/tmp"));
        let third = loader.load_module(&id("deployment.app.war")).expect("loads");
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.resource_roots(), &[Path::new("/tmp").to_path_buf()]);
    }

    #[test]
    fn test_load_resolves_imports() {
        let loader = DeploymentModuleLoader::new();
        loader.add_module_spec(ModuleConfig::new(id("lib.common")));
        loader.add_module_spec(ModuleConfig::new(id("deployment.app.war")).with_dependency(id("lib.common")));

        let module = loader.load_module(&id("deployment.app.war")).expect("loads");
        assert_eq!(module.imports().len(), 1);
        assert_eq!(module.imports()[0].identifier(), &id("lib.common"));
    }

    #[test]
    fn test_load_missing_import() {
        let loader = DeploymentModuleLoader::new();
        loader.add_module_spec(ModuleConfig::new(id("deployment.app.war")).with_dependency(id("lib.absent")));

        assert_eq!(
            loader.load_module(&id("deployment.app.war")).unwrap_err(),
            ResolutionError::MissingDependency {
                module: id("deployment.app.war"),
                dependency: id("lib.absent"),
            }
        );
    }

    #[test]
    fn test_load_cyclic_imports() {
        let loader = DeploymentModuleLoader::new();
        loader.add_module_spec(ModuleConfig::new(id("a")).with_dependency(id("b")));
        loader.add_module_spec(ModuleConfig::new(id("b")).with_dependency(id("a")));

        assert_eq!(loader.load_module(&id("a")).unwrap_err(), ResolutionError::Cycle(id("a")));
    }

    #[test]
    fn test_remove_module() {
        let loader = DeploymentModuleLoader::new();
        loader.add_module_spec(ModuleConfig::new(id("deployment.app.war")));
        loader.load_module(&id("deployment.app.war")).expect("loads");

        loader.remove_module(&id("deployment.app.war"));
        assert!(loader.load_module(&id("deployment.app.war")).is_err());
    }

    #[test]
    fn test_resource_lookup_falls_back_to_imports() {
        let lib_dir = TempDir::new().expect("tempdir");
        let app_dir = TempDir::new().expect("tempdir");
        fs::write(lib_dir.path().join("shared.txt"), "lib").expect("write");
        fs::write(app_dir.path().join("index.html"), "app").expect("write");

        let loader = DeploymentModuleLoader::new();
        loader.add_module_spec(ModuleConfig::new(id("lib")).with_resource_root(lib_dir.path()));
        loader.add_module_spec(
            ModuleConfig::new(id("app"))
                .with_resource_root(app_dir.path())
                .with_dependency(id("lib")),
        );

        let module = loader.load_module(&id("app")).expect("loads");
        assert_eq!(module.resource("index.html"), Some(app_dir.path().join("index.html")));
        assert_eq!(module.resource("shared.txt"), Some(lib_dir.path().join("shared.txt")));
        assert_eq!(module.resource("absent.txt"), None);
    }

    #[test]
    fn test_provider_selects_loader_by_file_name() {
        let default = DeploymentModuleLoader::new();
        let ear_loader = DeploymentModuleLoader::new();
        let provider = ModuleLoaderProvider::new(default.clone())
            .with_loader(Regex::new(r"\.ear$").expect("regex"), ear_loader.clone());

        assert_eq!(provider.loader_for(Path::new("/deployments/app.ear")).id(), ear_loader.id());
        assert_eq!(provider.loader_for(Path::new("/deployments/app.war")).id(), default.id());
        assert_ne!(default.id(), ear_loader.id());
    }
}
