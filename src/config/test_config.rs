use super::{Config, DeploydBox};
use regex::Regex;
use std::time::Duration;

/// Creates a new test configuration.
pub fn new_test_config() -> Config {
    Config {
        deployd: DeploydBox {
            env: super::TEST.to_string(),
            logs: Some(super::Logs {
                level: Some("debug".to_string()),
            }),
            runtime: Some(super::Runtime { num_cpus: 2 }),
            metrics: None,
            mount: Some(super::Mount {
                temp_dir: None,
                read_only: Some(true),
            }),
            deployment: Some(super::Deployment {
                roots: Vec::new(),
                wait_timeout: Some(Duration::from_secs(10)),
                shutdown_timeout: Some(Duration::from_secs(5)),
            }),
            chains: vec![super::Chain {
                name: "web".to_string(),
                pattern: r"\.war$".to_string(),
                module: true,
                imports: Vec::new(),
                compiled: Regex::new(r"\.war$").ok(),
            }],
            loaders: vec![super::Loader {
                pattern: r"\.ear$".to_string(),
                compiled: Regex::new(r"\.ear$").ok(),
            }],
        },
    }
}
