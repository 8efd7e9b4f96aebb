// Package chain provides the chain provider service.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::registry::{Service, ServiceName, ServiceValue, StartError, ROOT};

use super::chain::DeploymentChain;

/// Name of the provider service every deployment unit depends on.
pub static CHAIN_PROVIDER_SERVICE_NAME: Lazy<ServiceName> =
    Lazy::new(|| ROOT.append("deployment").append("chain").append("provider"));

/// DeploymentChainProvider selects the processing chain for an artifact root.
#[derive(Clone)]
pub struct DeploymentChainProvider {
    default: Arc<DeploymentChain>,
    selectors: Arc<Vec<(Regex, Arc<DeploymentChain>)>>,
}

impl DeploymentChainProvider {
    pub fn new(default: DeploymentChain) -> Self {
        Self {
            default: Arc::new(default),
            selectors: Arc::new(Vec::new()),
        }
    }

    /// Routes roots whose file name matches `pattern` to `chain`. First match wins.
    pub fn with_chain(mut self, pattern: Regex, chain: DeploymentChain) -> Self {
        Arc::make_mut(&mut self.selectors).push((pattern, Arc::new(chain)));
        self
    }

    pub fn chain_for(&self, root: &Path) -> Arc<DeploymentChain> {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.selectors
            .iter()
            .find(|(pattern, _)| pattern.is_match(&name))
            .map(|(_, chain)| chain.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl Service for DeploymentChainProvider {
    async fn start(&self, name: &ServiceName) -> Result<(), StartError> {
        info!(
            component = "chain",
            event = "provider_started",
            service = %name,
            default_chain = %self.default.name(),
            chains = self.selectors.len() + 1,
            "chain provider started"
        );
        Ok(())
    }

    async fn stop(&self, name: &ServiceName) {
        info!(component = "chain", event = "provider_stopped", service = %name, "chain provider stopped");
    }

    fn value(&self) -> Option<ServiceValue> {
        Some(Arc::new(self.clone()))
    }
}
