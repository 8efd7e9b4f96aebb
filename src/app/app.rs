// Main deployd application implementation.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chain::{DeploymentChain, DeploymentChainProvider, ModuleConfigProcessor, MODULE_CONFIG_PRIORITY};
use crate::config::{Config, ConfigTrait};
use crate::deployment::DeploymentManager;
use crate::module::{ModuleIdentifier, ModuleLoaderProvider};
use crate::registry::ServiceContainer;
use crate::shutdown::GracefulShutdown;

const DEFAULT_CHAIN: &str = "default";

/// Encapsulates the entire deployd application state.
#[derive(Clone)]
pub struct App {
    cfg: Config,
    shutdown_token: CancellationToken,
    registry: ServiceContainer,
    manager: Arc<DeploymentManager>,
    roots: Vec<PathBuf>,
}

impl App {
    /// Creates the registry and the deployment manager. Must be called inside the runtime.
    pub fn new(shutdown_token: CancellationToken, cfg: Config, extra_roots: Vec<PathBuf>) -> Result<Self> {
        let runtime = Handle::current();
        let registry = ServiceContainer::new(runtime.clone());

        let mount = cfg.mount();
        let manager = DeploymentManager::new(Arc::new(registry.clone()), runtime)
            .with_temp_dir(mount.and_then(|m| m.temp_dir.clone()))
            .with_read_only(mount.and_then(|m| m.read_only).unwrap_or(true))
            .with_undeploy_hook(Arc::new(|roots: &[PathBuf]| {
                info!(component = "app", event = "undeploy_hook", roots = ?roots, "deployments torn down");
            }));
        manager.start().context("failed to start deployment manager")?;
        manager
            .install_providers(chain_provider(&cfg), loader_provider(&cfg))
            .context("failed to install deployment providers")?;

        let mut roots = cfg.roots().to_vec();
        roots.extend(extra_roots);

        Ok(Self {
            cfg,
            shutdown_token,
            registry,
            manager: Arc::new(manager),
            roots,
        })
    }

    /// Deploys the configured roots and keeps them running until shutdown.
    pub async fn serve(&self, gsh: Arc<GracefulShutdown>) -> Result<()> {
        let app = self.clone();
        tokio::task::spawn(async move {
            app.deploy_roots().await;
            app.shutdown_token.cancelled().await;

            if let Err(e) = app.close().await {
                error!(
                    component = "app",
                    scope = "shutdown",
                    event = "close_failed",
                    error = %e,
                    "application close failed"
                );
            }
            gsh.done();
        });

        info!(
            component = "app",
            event = "started",
            roots = self.roots.len(),
            "application lifecycle"
        );
        Ok(())
    }

    async fn deploy_roots(&self) {
        if self.roots.is_empty() {
            warn!(component = "app", event = "no_roots", "nothing to deploy");
            return;
        }

        let wait = self.cfg.wait_timeout();
        let future = self.manager.deploy(self.roots.clone());
        match timeout(wait, future.wait()).await {
            Ok(result) => {
                let json = serde_json::to_string(&result).unwrap_or_default();
                if result.is_success() {
                    info!(component = "app", event = "deployed", result = %json, "deployment finished");
                } else {
                    error!(component = "app", event = "deploy_failed", result = %json, "deployment finished");
                }
            }
            Err(_) => warn!(
                component = "app",
                event = "deploy_timeout",
                timeout = %humantime::format_duration(wait),
                "deployment still running after wait timeout"
            ),
        }
    }

    /// Undeploys whatever is still deployed and releases the manager.
    pub async fn close(&self) -> Result<()> {
        let deployed: Vec<PathBuf> = self
            .roots
            .iter()
            .filter(|root| self.manager.is_deployed(root))
            .cloned()
            .collect();

        if !deployed.is_empty() {
            self.manager
                .undeploy(deployed)
                .await
                .context("failed to undeploy on close")?;
        }
        self.manager.close();
        self.shutdown_token.cancel();

        info!(
            component = "app",
            event = "stopped",
            services = self.registry.len(),
            "application lifecycle"
        );
        Ok(())
    }
}

fn module_chain(name: &str, imports: &[String]) -> DeploymentChain {
    let processor = imports
        .iter()
        .map(ModuleIdentifier::new)
        .fold(ModuleConfigProcessor::new(), ModuleConfigProcessor::with_import);
    DeploymentChain::new(name).add_processor(MODULE_CONFIG_PRIORITY, "module-config", Arc::new(processor))
}

/// Builds the chain provider: one chain per configured pattern, plus a default chain that
/// declares a module for every root.
pub fn chain_provider(cfg: &Config) -> DeploymentChainProvider {
    cfg.chains()
        .iter()
        .filter_map(|chain| chain.compiled.clone().map(|pattern| (pattern, chain)))
        .fold(
            DeploymentChainProvider::new(module_chain(DEFAULT_CHAIN, &[])),
            |provider, (pattern, chain)| {
                let built = if chain.module {
                    module_chain(&chain.name, &chain.imports)
                } else {
                    DeploymentChain::new(&chain.name)
                };
                provider.with_chain(pattern, built)
            },
        )
}

/// Builds the module-loader provider: a dedicated loader per configured pattern.
pub fn loader_provider(cfg: &Config) -> ModuleLoaderProvider {
    cfg.loaders()
        .iter()
        .filter_map(|loader| loader.compiled.clone())
        .fold(ModuleLoaderProvider::default(), ModuleLoaderProvider::with_dedicated_loader)
}
