// Configuration loading and management.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const DEBUG: &str = "debug";
#[allow(dead_code)]
pub const TEST: &str = "test";

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Deployd {
    #[serde(rename = "deployd")]
    pub deployd: DeploydBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeploydBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub runtime: Option<Runtime>,
    pub metrics: Option<Metrics>,
    pub mount: Option<Mount>,
    pub deployment: Option<Deployment>,
    #[serde(default)]
    pub chains: Vec<Chain>,
    #[serde(default)]
    pub loaders: Vec<Loader>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runtime {
    pub num_cpus: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metrics {
    pub enabled: bool,
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Mount {
    #[serde(rename = "temp_dir")]
    pub temp_dir: Option<PathBuf>,
    #[serde(rename = "read_only")]
    pub read_only: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Deployment {
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    #[serde(rename = "wait_timeout", default, with = "humantime_serde")]
    pub wait_timeout: Option<Duration>,
    #[serde(rename = "shutdown_timeout", default, with = "humantime_serde")]
    pub shutdown_timeout: Option<Duration>,
}

/// Processing chain selected for roots whose file name matches `pattern`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chain {
    pub name: String,
    pub pattern: String,
    /// Whether the chain declares a module rooted at the artifact.
    #[serde(default)]
    pub module: bool,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(skip)]
    pub compiled: Option<Regex>,
}

/// Dedicated module loader for roots whose file name matches `pattern`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Loader {
    pub pattern: String,
    #[serde(skip)]
    pub compiled: Option<Regex>,
}

pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    fn is_debug(&self) -> bool;
    fn is_dev(&self) -> bool;
    fn is_test(&self) -> bool;
    fn runtime(&self) -> &Runtime;
    fn metrics(&self) -> Option<&Metrics>;
    fn mount(&self) -> Option<&Mount>;
    fn deployment(&self) -> Option<&Deployment>;
    fn chains(&self) -> &[Chain];
    fn loaders(&self) -> &[Loader];
    fn roots(&self) -> &[PathBuf];
    fn wait_timeout(&self) -> Duration;
    fn shutdown_timeout(&self) -> Duration;
}

// Config type alias for convenience
pub type Config = Deployd;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.deployd.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.deployd.env == PROD
    }

    fn is_debug(&self) -> bool {
        self.deployd.env == DEBUG
    }

    fn is_dev(&self) -> bool {
        self.deployd.env == DEV
    }

    fn is_test(&self) -> bool {
        self.deployd.env == TEST
    }

    fn runtime(&self) -> &Runtime {
        self.deployd
            .runtime
            .as_ref()
            .unwrap_or(&Runtime { num_cpus: 0 })
    }

    fn metrics(&self) -> Option<&Metrics> {
        self.deployd.metrics.as_ref()
    }

    fn mount(&self) -> Option<&Mount> {
        self.deployd.mount.as_ref()
    }

    fn deployment(&self) -> Option<&Deployment> {
        self.deployd.deployment.as_ref()
    }

    fn chains(&self) -> &[Chain] {
        &self.deployd.chains
    }

    fn loaders(&self) -> &[Loader] {
        &self.deployd.loaders
    }

    fn roots(&self) -> &[PathBuf] {
        self.deployment().map(|d| d.roots.as_slice()).unwrap_or(&[])
    }

    fn wait_timeout(&self) -> Duration {
        self.deployment()
            .and_then(|d| d.wait_timeout)
            .unwrap_or(DEFAULT_WAIT_TIMEOUT)
    }

    fn shutdown_timeout(&self) -> Duration {
        self.deployment()
            .and_then(|d| d.shutdown_timeout)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        // Read file
        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::parse(&data).with_context(|| format!("unmarshal yaml from {:?}", abs_path))
    }

    /// Parses YAML and compiles the chain and loader patterns.
    pub fn parse(data: &str) -> Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(data)?;

        for chain in cfg.deployd.chains.iter_mut() {
            let compiled = Regex::new(&chain.pattern)
                .with_context(|| format!("invalid pattern {:?} of chain {}", chain.pattern, chain.name))?;
            chain.compiled = Some(compiled);
        }
        for loader in cfg.deployd.loaders.iter_mut() {
            let compiled = Regex::new(&loader.pattern)
                .with_context(|| format!("invalid loader pattern {:?}", loader.pattern))?;
            loader.compiled = Some(compiled);
        }

        if let Some(metrics) = cfg.metrics() {
            if metrics.enabled && metrics.listen.is_none() {
                anyhow::bail!("metrics.listen is required when metrics are enabled");
            }
        }

        Ok(cfg)
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;

#[cfg(test)]
mod config_test;
