//! Integration tests for simply-config

use simply_config::{ConfigError, OutputKind, parser};
use std::io::Write;

#[test]
fn test_full_config_parsing() {
    let yaml = r#"
version: "1.0"
sequence:
  - db
  - web

platforms:
  web:
    backend: local
    frontend: debian
    hosts:
      web1: localhost
    operations:
      uptime:
        command: "cat /proc/uptime"
        description: "Seconds since boot"
      has_file:
        command: "test -e {path}"
        policy: all_true
        output: status

  db:
    backend: docker
    frontend: alpine
    image: "alpine:3.19"
    parameters: "--cap-add NET_ADMIN"
    user: admin
    hosts:
      db1: simply-db1
      db2: simply-db2
"#;

    let config = parser::parse_str(yaml).unwrap();
    assert_eq!(config.version.as_deref(), Some("1.0"));
    assert_eq!(config.setup_order(), ["db", "web"]);

    let web = config.platform("web").unwrap();
    assert_eq!(web.operations.len(), 2);
    let uptime = &web.operations["uptime"];
    assert_eq!(uptime.policy, "map");
    assert_eq!(uptime.output, OutputKind::Stdout);
    assert_eq!(uptime.description.as_deref(), Some("Seconds since boot"));
    let has_file = &web.operations["has_file"];
    assert_eq!(has_file.policy, "all_true");
    assert_eq!(has_file.output, OutputKind::Status);

    let db = config.platform("db").unwrap();
    assert_eq!(db.backend, "docker");
    assert_eq!(db.frontend, "alpine");
    assert_eq!(
        db.hosts.keys().map(String::as_str).collect::<Vec<_>>(),
        ["db1", "db2"]
    );
    assert_eq!(db.option_str("user"), Some("admin"));
    assert_eq!(db.option_str("parameters"), Some("--cap-add NET_ADMIN"));
}

#[test]
fn test_parse_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "platforms:\n  p:\n    backend: local\n    frontend: alpine\n    hosts:\n      h1: localhost"
    )
    .unwrap();

    let config = parser::parse_file(file.path()).unwrap();
    assert_eq!(config.platform("p").unwrap().frontend, "alpine");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = parser::parse_file(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadError(_)));
}

#[test]
fn test_invalid_yaml() {
    let err = parser::parse_str("platforms: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::YamlError(_)));
}

#[test]
fn test_missing_backend_key() {
    let yaml = "platforms:\n  p:\n    frontend: debian\n    hosts:\n      h1: a\n";
    let err = parser::parse_str(yaml).unwrap_err();
    assert!(err.to_string().contains("backend"), "{err}");
}

#[test]
fn test_overrides_from_command_line() {
    let yaml = "platforms:\n  p:\n    backend: docker\n    frontend: debian\n    image: debian:bookworm\n    hosts:\n      h1: c1\n";
    let config = parser::parse_str(yaml).unwrap();

    let overrides = ["image=debian:trixie", "hosts.h2=c2"]
        .iter()
        .map(|s| parser::parse_override(s))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let spec = config
        .platform("p")
        .unwrap()
        .with_overrides(overrides.iter().map(|(k, v)| (k.as_str(), v.clone())))
        .unwrap();

    assert_eq!(spec.option_str("image"), Some("debian:trixie"));
    assert_eq!(spec.hosts.len(), 2);
}
