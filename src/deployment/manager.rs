// Package deployment provides the deployment manager driving artifacts through mount,
// processing, module resolution and item installation.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::chain::{DeploymentChainProvider, ProcessingContext, CHAIN_PROVIDER_SERVICE_NAME};
use crate::item::ItemContext;
use crate::metrics;
use crate::module::{ModuleLoaderProvider, MODULE_CONFIG, MODULE_LOADER_PROVIDER_SERVICE_NAME};
use crate::mount::{mount_service_name, MountHandle, MountService, TempFileProvider};
use crate::registry::{
    Batch, InjectorBinding, Mode, RegistrationError, ServiceDescriptor, ServiceName, ServiceRegistry, SubBatch,
};
use crate::unit::{UnitContext, MOUNT_ROOT_ATTACHMENT, ROOT_ATTACHMENT};

use super::error::DeploymentError;
use super::future::DeploymentFuture;
use super::listener::{BatchCallback, BatchSummary, Completion, DeploymentServiceListener};
use super::result::DeploymentResult;
use super::service::{
    deployment_service_name, DeploymentService, DEPLOYMENT_CHAIN_PROPERTY, MODULE_LOADER_PROPERTY, MOUNT_PROPERTY,
};

/// Hook run after an undeploy finished tearing down its services.
pub type UndeployHook = Arc<dyn Fn(&[PathBuf]) + Send + Sync>;

/// One artifact of a deployment request.
struct Deployment {
    name: String,
    unit_name: ServiceName,
    service: Arc<DeploymentService>,
    unit: UnitContext,
}

/// DeploymentManager deploys and undeploys artifact roots against a service registry.
pub struct DeploymentManager {
    registry: Arc<dyn ServiceRegistry>,
    runtime: Handle,
    temp_dir: Option<PathBuf>,
    read_only: bool,
    undeploy_hook: Option<UndeployHook>,
    temp_files: RwLock<Option<Arc<TempFileProvider>>>,
}

impl DeploymentManager {
    /// Creates a manager. Phases 2 and 3 of every deployment run on `runtime`'s blocking pool.
    pub fn new(registry: Arc<dyn ServiceRegistry>, runtime: Handle) -> Self {
        Self {
            registry,
            runtime,
            temp_dir: None,
            read_only: true,
            undeploy_hook: None,
            temp_files: RwLock::new(None),
        }
    }

    /// Stages archives under `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Whether staged archive copies are made read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_undeploy_hook(mut self, hook: UndeployHook) -> Self {
        self.undeploy_hook = Some(hook);
        self
    }

    /// Creates the temp-file provider mounts stage their content in.
    pub fn start(&self) -> Result<(), DeploymentError> {
        let mut temp_files = self.temp_files.write();
        if temp_files.is_some() {
            return Ok(());
        }
        let provider = TempFileProvider::create(self.temp_dir.as_deref())
            .map_err(|e| DeploymentError::internal(format!("failed to create temp file provider: {e}")))?;
        *temp_files = Some(provider);
        info!(component = "deployment-manager", event = "started", "deployment manager started");
        Ok(())
    }

    /// Releases the temp-file provider. Scratch space still used by a live mount is removed
    /// once that mount goes away.
    pub fn close(&self) {
        let Some(provider) = self.temp_files.write().take() else {
            return;
        };
        match Arc::try_unwrap(provider) {
            Ok(provider) => {
                if let Err(e) = provider.close() {
                    warn!(component = "deployment-manager", event = "close_error", error = %e, "failed to remove temp files");
                }
            }
            Err(_) => debug!(component = "deployment-manager", event = "close_deferred", "temp files still in use by mounts"),
        }
        info!(component = "deployment-manager", event = "closed", "deployment manager closed");
    }

    /// Installs the chain and module-loader providers every deployment unit depends on.
    pub fn install_providers(
        &self,
        chains: DeploymentChainProvider,
        loaders: ModuleLoaderProvider,
    ) -> Result<(), RegistrationError> {
        let mut batch = Batch::new();
        batch.add_service(ServiceDescriptor::new(CHAIN_PROVIDER_SERVICE_NAME.clone(), Arc::new(chains)));
        batch.add_service(ServiceDescriptor::new(
            MODULE_LOADER_PROVIDER_SERVICE_NAME.clone(),
            Arc::new(loaders),
        ));
        self.registry.install(batch)
    }

    /// Checks whether a deployment unit is installed for `root`.
    pub fn is_deployed(&self, root: &Path) -> bool {
        deployment_name(root)
            .map(|name| self.registry.lookup(&deployment_service_name(&name)).is_some())
            .unwrap_or(false)
    }

    /// Deploys the given roots. Returns at once; the future resolves when every phase is over.
    pub fn deploy(&self, roots: Vec<PathBuf>) -> DeploymentFuture {
        let future = DeploymentFuture::new();
        info!(
            component = "deployment-manager",
            event = "deploy_requested",
            roots = roots.len(),
            "deployment requested"
        );
        if let Err(cause) = self.register(&roots, &future) {
            complete(&future, DeploymentResult::rejected(cause));
        }
        future
    }

    /// Deploys and waits for the result without blocking the calling task.
    pub async fn deploy_async(&self, roots: Vec<PathBuf>) -> DeploymentResult {
        self.deploy(roots).wait().await
    }

    /// Deploys and blocks the calling thread until the result is available.
    ///
    /// Must not be called from an async worker thread.
    pub fn deploy_and_wait(&self, roots: Vec<PathBuf>) -> DeploymentResult {
        self.deploy(roots).get()
    }

    /// Stops and removes every service of the given deployments as one unit.
    pub async fn undeploy(&self, roots: Vec<PathBuf>) -> Result<(), DeploymentError> {
        let mut names = Vec::with_capacity(roots.len());
        for root in &roots {
            let name = deployment_name(root)?;
            let unit_name = deployment_service_name(&name);
            if self.registry.lookup(&unit_name).is_none() {
                warn!(component = "deployment-manager", event = "not_deployed", deployment = %name, "undeploy of unknown deployment");
                return Err(DeploymentError::NotDeployed(name));
            }
            names.push(unit_name);
        }

        let hook = self.undeploy_hook.clone();
        let hook_roots = roots.clone();
        self.registry
            .stop_all(
                names,
                Box::new(move || {
                    if let Some(hook) = hook {
                        hook(&hook_roots);
                    }
                }),
            )
            .await;

        metrics::add_undeployments(roots.len() as u64);
        info!(component = "deployment-manager", event = "undeployed", roots = roots.len(), "deployments removed");
        Ok(())
    }

    /// Undeploys the roots and deploys them again.
    pub async fn redeploy(&self, roots: Vec<PathBuf>) -> Result<DeploymentFuture, DeploymentError> {
        self.undeploy(roots.clone()).await?;
        Ok(self.deploy(roots))
    }

    /// Undeploys `to_replace`, then deploys `new_root` in its place.
    pub async fn replace(&self, new_root: PathBuf, to_replace: PathBuf) -> Result<DeploymentFuture, DeploymentError> {
        self.undeploy(vec![to_replace]).await?;
        Ok(self.deploy(vec![new_root]))
    }

    // Phase 1: builds the mount and deployment-unit descriptors of every root and submits them.
    fn register(&self, roots: &[PathBuf], future: &DeploymentFuture) -> Result<(), DeploymentError> {
        let temp_files = self
            .temp_files
            .read()
            .clone()
            .ok_or_else(|| DeploymentError::internal("deployment manager is not started"))?;

        if let Some(missing) = roots.iter().find(|root| !root.exists()) {
            return Err(DeploymentError::RootNotFound(missing.clone()));
        }

        let mut batch = Batch::new();
        let mut deployments = Vec::with_capacity(roots.len());
        for root in roots {
            let name = deployment_name(root)?;
            let mount_name = mount_service_name(&name);
            let unit_name = deployment_service_name(&name);
            let service = Arc::new(DeploymentService::new(&name, root));

            batch.add_service(
                ServiceDescriptor::new(
                    mount_name.clone(),
                    Arc::new(MountService::new(root, temp_files.clone(), self.read_only)),
                )
                .with_mode(Mode::OnDemand),
            );
            batch.add_service(unit_descriptor(&unit_name, &mount_name, root, &service));

            let mut unit = UnitContext::new(&name);
            unit.put(ROOT_ATTACHMENT, root.clone());
            deployments.push(Deployment {
                name,
                unit_name,
                service,
                unit,
            });
        }

        let listener = Arc::new(DeploymentServiceListener::new(completion_callback(future.clone())));
        listener.start_batch(Some(self.after_registration(future.clone(), Arc::downgrade(&listener), deployments)));
        batch.add_listener(listener.clone());

        self.registry.install(batch)?;
        listener.finish_batch();
        Ok(())
    }

    // Runs once every phase-1 service settled.
    fn after_registration(
        &self,
        future: DeploymentFuture,
        listener: Weak<DeploymentServiceListener>,
        deployments: Vec<Deployment>,
    ) -> BatchCallback {
        let registry = self.registry.clone();
        let runtime = self.runtime.clone();
        Box::new(move |summary: BatchSummary| {
            let elapsed_millis = summary.elapsed.as_millis() as u64;
            if !summary.failures.is_empty() {
                let cause = DeploymentError::ServicesFailed(summary.failures.len());
                complete(
                    &future,
                    DeploymentResult::failure(cause, summary.failures, elapsed_millis, summary.service_count),
                );
                return;
            }

            let Some(listener) = listener.upgrade() else {
                let cause = DeploymentError::internal("deployment was removed before processing");
                complete(
                    &future,
                    DeploymentResult::failure(cause, Default::default(), elapsed_millis, summary.service_count),
                );
                return;
            };

            runtime.spawn_blocking(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    process_and_install(registry.as_ref(), &listener, deployments)
                }))
                .unwrap_or_else(|_| Err(DeploymentError::internal("deployment processing panicked")));
                if let Err(cause) = outcome {
                    let result = DeploymentResult::failure(
                        cause,
                        listener.failures(),
                        listener.elapsed().as_millis() as u64,
                        listener.service_count(),
                    );
                    complete(&future, result);
                }
            });
        })
    }
}

/// Gets the deployment name of a root (its file name).
fn deployment_name(root: &Path) -> Result<String, DeploymentError> {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| DeploymentError::internal(format!("{} has no file name", root.display())))
}

fn unit_descriptor(
    unit_name: &ServiceName,
    mount_name: &ServiceName,
    root: &Path,
    service: &Arc<DeploymentService>,
) -> ServiceDescriptor {
    let mount = {
        let service = service.clone();
        InjectorBinding::translating::<MountHandle, _, _, _>(
            MOUNT_PROPERTY,
            |mount| Ok(mount.clone()),
            move |mount| service.set_mount(mount),
        )
    };
    let chain = {
        let service = service.clone();
        let root = root.to_path_buf();
        InjectorBinding::translating::<DeploymentChainProvider, _, _, _>(
            DEPLOYMENT_CHAIN_PROPERTY,
            move |provider| Ok(provider.chain_for(&root)),
            move |chain| service.set_chain(chain),
        )
    };
    let loader = {
        let service = service.clone();
        let root = root.to_path_buf();
        InjectorBinding::translating::<ModuleLoaderProvider, _, _, _>(
            MODULE_LOADER_PROPERTY,
            move |provider| Ok(provider.loader_for(&root)),
            move |loader| service.set_module_loader(loader),
        )
    };

    ServiceDescriptor::new(unit_name.clone(), service.clone())
        .inject_from(mount_name.clone(), mount)
        .inject_from(CHAIN_PROVIDER_SERVICE_NAME.clone(), chain)
        .inject_from(MODULE_LOADER_PROVIDER_SERVICE_NAME.clone(), loader)
}

// Phases 2 and 3: runs the chain of every artifact, then resolves modules, installs items
// and submits the resulting services.
fn process_and_install(
    registry: &dyn ServiceRegistry,
    listener: &Arc<DeploymentServiceListener>,
    mut deployments: Vec<Deployment>,
) -> Result<(), DeploymentError> {
    for deployment in &mut deployments {
        let (chain, loader) = deployment
            .service
            .chain()
            .zip(deployment.service.module_loader())
            .ok_or_else(|| DeploymentError::internal(format!("{} started without injections", deployment.name)))?;
        if let Some(mount) = deployment.service.mount() {
            deployment.unit.put(MOUNT_ROOT_ATTACHMENT, mount.root().to_path_buf());
        }

        debug!(component = "deployment-manager", event = "processing", deployment = %deployment.name, chain = %chain.name(), "processing deployment");
        let processed = chain.process(&mut ProcessingContext::new(&mut deployment.unit, &loader));
        // The loader already holds the module config, even when a later stage failed.
        if let Some(config) = deployment.unit.get(MODULE_CONFIG) {
            deployment.service.set_module(config.identifier.clone());
        }
        processed.map_err(|source| DeploymentError::Processing {
            deployment: deployment.name.clone(),
            source,
        })?;
    }

    let mut batch = Batch::new();
    for deployment in &deployments {
        let loader = deployment
            .service
            .module_loader()
            .ok_or_else(|| DeploymentError::internal(format!("{} has no module loader", deployment.name)))?;

        let module = match deployment.unit.get(MODULE_CONFIG) {
            Some(config) => {
                let module = loader
                    .load_module(&config.identifier)
                    .map_err(|source| DeploymentError::Resolution {
                        deployment: deployment.name.clone(),
                        source,
                    })?;
                Some(module)
            }
            None => None,
        };

        let mut sub = SubBatch::new();
        sub.add_dependency(deployment.unit_name.clone());
        let mut ctx = ItemContext::new(&deployment.name, &deployment.unit_name, module.as_ref(), &loader, &mut sub);
        for item in deployment.unit.deployment_items() {
            item.install(&mut ctx).map_err(|source| DeploymentError::ItemInstall {
                deployment: deployment.name.clone(),
                source,
            })?;
        }
        debug!(
            component = "deployment-manager",
            event = "items_installed",
            deployment = %deployment.name,
            items = deployment.unit.deployment_items().len(),
            services = ctx.service_count(),
            "deployment items installed"
        );
        batch.add_sub_batch(sub);
    }

    listener.start_batch(None);
    batch.add_listener(listener.clone());
    registry.install(batch)?;
    listener.finish_batch();
    listener.finish_deployment();
    Ok(())
}

fn completion_callback(future: DeploymentFuture) -> Box<dyn FnOnce(Completion) + Send> {
    Box::new(move |completion: Completion| {
        let elapsed_millis = completion.elapsed.as_millis() as u64;
        let result = if completion.failures.is_empty() {
            DeploymentResult::success(elapsed_millis, completion.service_count)
        } else {
            DeploymentResult::failure(
                DeploymentError::ServicesFailed(completion.failures.len()),
                completion.failures,
                elapsed_millis,
                completion.service_count,
            )
        };
        complete(&future, result);
    })
}

fn complete(future: &DeploymentFuture, result: DeploymentResult) {
    let summary = result.clone();
    if future.resolve(result).is_err() {
        warn!(component = "deployment-manager", event = "already_resolved", "deployment result dropped, future already resolved");
        return;
    }

    metrics::record_deployment(&summary);
    match summary.cause() {
        None => info!(
            component = "deployment-manager",
            event = "deployed",
            services = summary.service_count(),
            elapsed_ms = summary.elapsed_millis(),
            "deployment succeeded"
        ),
        Some(cause) => warn!(
            component = "deployment-manager",
            event = "deploy_failed",
            kind = cause.kind(),
            error = %cause,
            failures = summary.failures().len(),
            services = summary.service_count(),
            elapsed_ms = summary.elapsed_millis(),
            "deployment failed"
        ),
    }
}
