#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::config::{Config, ConfigTrait};

    const YAML: &str = r#"
deployd:
  env: prod
  logs:
    level: info
  runtime:
    num_cpus: 4
  metrics:
    enabled: true
    listen: 127.0.0.1:9102
  mount:
    temp_dir: /var/tmp/deployd
    read_only: false
  deployment:
    roots:
      - /srv/deployments/app.war
    wait_timeout: 2m
    shutdown_timeout: 15s
  chains:
    - name: web
      pattern: '\.war$'
      module: true
      imports: [lib.common]
  loaders:
    - pattern: '\.ear$'
"#;

    #[test]
    fn test_parse_full_config() {
        let cfg = Config::parse(YAML).expect("parses");
        assert!(cfg.is_prod());
        assert_eq!(cfg.runtime().num_cpus, 4);
        assert_eq!(cfg.logs().and_then(|l| l.level.as_deref()), Some("info"));
        assert_eq!(cfg.metrics().and_then(|m| m.listen).map(|a| a.port()), Some(9102));
        assert_eq!(cfg.mount().and_then(|m| m.read_only), Some(false));
        assert_eq!(cfg.roots(), &[PathBuf::from("/srv/deployments/app.war")]);
        assert_eq!(cfg.wait_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(15));

        let chain = &cfg.chains()[0];
        assert!(chain.module);
        assert_eq!(chain.imports, vec!["lib.common".to_string()]);
        assert!(chain.compiled.as_ref().expect("compiled").is_match("app.war"));
        assert!(cfg.loaders()[0].compiled.as_ref().expect("compiled").is_match("app.ear"));
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::parse("deployd:\n  env: dev\n").expect("parses");
        assert!(cfg.is_dev());
        assert_eq!(cfg.runtime().num_cpus, 0);
        assert!(cfg.roots().is_empty());
        assert!(cfg.chains().is_empty());
        assert_eq!(cfg.wait_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let yaml = "deployd:\n  env: dev\n  chains:\n    - name: broken\n      pattern: '(['\n";
        let err = Config::parse(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("broken"));
    }

    #[test]
    fn test_metrics_require_listen_address() {
        let yaml = "deployd:\n  env: dev\n  metrics:\n    enabled: true\n";
        assert!(Config::parse(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(YAML.as_bytes()).expect("write");
        let cfg = tokio_test::assert_ok!(Config::load(file.path()));
        assert_eq!(cfg.roots().len(), 1);

        assert!(Config::load("/definitely/not/here.yaml").is_err());
    }

    #[test]
    fn test_test_config() {
        let cfg = crate::config::new_test_config();
        assert!(cfg.is_test());
        assert_eq!(cfg.wait_timeout(), Duration::from_secs(10));
    }
}
