//! Configuration parser with environment variable substitution

use crate::{
    Config, ConfigError, Result,
    resolver::{ResolutionContext, missing_to_result, resolve_collecting},
};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Supported configuration version
pub const CONFIG_VERSION: &str = "1.0";

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string, reading the process environment
pub fn parse_str(content: &str) -> Result<Config> {
    parse_str_with_context(content, &ResolutionContext::new())
}

/// Parse YAML configuration from a string with an explicit resolution context.
///
/// `${VAR}` references are resolved in string values after parsing, so a
/// substituted value never changes the document's structure. Script
/// operation commands are left as written: `${...}` there is shell syntax.
pub fn parse_str_with_context(content: &str, context: &ResolutionContext) -> Result<Config> {
    let mut config: Config = serde_yaml::from_str(content)?;
    resolve_config(&mut config, context)?;
    validate_config(&config)?;
    Ok(config)
}

/// Substitute variables in every string value except operation commands
fn resolve_config(config: &mut Config, context: &ResolutionContext) -> Result<()> {
    let mut missing = BTreeSet::new();
    let mut resolve = |s: &mut String| *s = resolve_collecting(s, context, &mut missing);

    if let Some(version) = config.version.as_mut() {
        resolve(version);
    }
    config.sequence.iter_mut().for_each(&mut resolve);

    for spec in config.platforms.values_mut() {
        resolve(&mut spec.backend);
        resolve(&mut spec.frontend);
        spec.hosts.values_mut().for_each(&mut resolve);
        for value in spec.options.values_mut() {
            resolve_value(value, &mut resolve);
        }
        for operation in spec.operations.values_mut() {
            resolve(&mut operation.policy);
            if let Some(description) = operation.description.as_mut() {
                resolve(description);
            }
        }
    }

    missing_to_result(missing)
}

fn resolve_value(value: &mut Value, resolve: &mut impl FnMut(&mut String)) {
    match value {
        Value::String(s) => resolve(s),
        Value::Array(items) => items.iter_mut().for_each(|item| resolve_value(item, resolve)),
        Value::Object(map) => map.values_mut().for_each(|item| resolve_value(item, resolve)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(version) = &config.version {
        if version != CONFIG_VERSION {
            return Err(ConfigError::ValidationError(format!(
                "Unsupported version: {version}, expected {CONFIG_VERSION}"
            )));
        }
    }

    if config.platforms.is_empty() {
        return Err(ConfigError::ValidationError(
            "no platforms declared".to_string(),
        ));
    }

    for (name, platform) in &config.platforms {
        if platform.backend.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Platform '{name}' has an empty backend"
            )));
        }
        if platform.frontend.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Platform '{name}' has an empty frontend"
            )));
        }
        if platform.hosts.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Platform '{name}' declares no hosts"
            )));
        }

        let mut addresses = HashSet::new();
        for (id, address) in &platform.hosts {
            if id.is_empty() || address.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Platform '{name}' has a host with an empty id or address"
                )));
            }
            if !addresses.insert(address.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Platform '{name}' maps several hosts to address '{address}'"
                )));
            }
        }

        for (op, spec) in &platform.operations {
            if spec.command.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Operation '{op}' of platform '{name}' has an empty command"
                )));
            }
        }
    }

    for name in &config.sequence {
        if !config.platforms.contains_key(name) {
            return Err(ConfigError::ValidationError(format!(
                "Sequence references unknown platform '{name}'"
            )));
        }
    }

    Ok(())
}

/// Parse a `key=value` override.
///
/// The value is read as a YAML scalar: `3` is a number, `true` a boolean,
/// anything unparseable stays a string.
pub fn parse_override(input: &str) -> Result<(String, Value)> {
    let (key, raw) = input
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidOverride(input.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidOverride(input.to_string()));
    }

    if raw.trim().is_empty() {
        return Ok((key.to_string(), Value::Null));
    }
    let value = match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINIMAL: &str = r#"
platforms:
  web:
    backend: local
    frontend: debian
    hosts:
      h1: localhost
"#;

    #[test]
    fn test_parse_minimal() {
        let config = parse_str(MINIMAL).unwrap();
        let web = config.platform("web").unwrap();
        assert_eq!(web.backend, "local");
        assert_eq!(web.hosts.get("h1").map(String::as_str), Some("localhost"));
        assert!(web.options.is_empty());
    }

    #[test]
    fn test_extra_keys_are_options() {
        let yaml = r#"
version: "1.0"
platforms:
  db:
    backend: docker
    frontend: alpine
    image: alpine:3.19
    parameters: "--privileged"
    hosts:
      db1: simply-db1
"#;
        let config = parse_str(yaml).unwrap();
        let db = config.platform("db").unwrap();
        assert_eq!(db.option_str("image"), Some("alpine:3.19"));
        assert_eq!(db.option_str("parameters"), Some("--privileged"));
        assert!(db.option("hosts").is_none());
    }

    #[test]
    fn test_env_substitution() {
        let yaml = "platforms:\n  p:\n    backend: ${BACKEND}\n    frontend: ${FRONTEND:-debian}\n    hosts:\n      h1: a\n";
        let context = ResolutionContext::isolated([("BACKEND", "docker")]);
        let config = parse_str_with_context(yaml, &context).unwrap();
        let p = config.platform("p").unwrap();
        assert_eq!(p.backend, "docker");
        assert_eq!(p.frontend, "debian");
    }

    #[test]
    fn test_operation_commands_keep_shell_references() {
        let yaml = r#"
platforms:
  p:
    backend: local
    frontend: debian
    hosts: {h1: a}
    operations:
      check_home:
        command: 'test -n "${HOME_DIR}"'
        description: "checks ${WHAT:-home}"
"#;
        let context = ResolutionContext::isolated([("HOME_DIR", "/root")]);
        let config = parse_str_with_context(yaml, &context).unwrap();
        let op = &config.platform("p").unwrap().operations["check_home"];
        assert_eq!(op.command, r#"test -n "${HOME_DIR}""#);
        assert_eq!(op.description.as_deref(), Some("checks home"));

        let empty = ResolutionContext::isolated(Vec::<(String, String)>::new());
        assert!(parse_str_with_context(yaml, &empty).is_ok());
    }

    #[test]
    fn test_substituted_values_stay_scalars() {
        let yaml = r#"
platforms:
  p:
    backend: docker
    frontend: debian
    image: ${IMG}
    image_spec: "FROM ${BASE}\nARG V\nRUN echo $${V}\n"
    images: {h1: "${IMG}"}
    hosts: {h1: "${ADDR:-c1}"}
"#;
        let context = ResolutionContext::isolated([("IMG", "repo: x"), ("BASE", "alpine")]);
        let config = parse_str_with_context(yaml, &context).unwrap();
        let p = config.platform("p").unwrap();
        assert_eq!(p.option_str("image"), Some("repo: x"));
        assert_eq!(p.option_str("image_spec"), Some("FROM alpine\nARG V\nRUN echo ${V}\n"));
        assert_eq!(p.option("images").unwrap()["h1"], json!("repo: x"));
        assert_eq!(p.hosts["h1"], "c1");
    }

    #[test]
    fn test_missing_variables_are_reported_together() {
        let yaml = "platforms:\n  p:\n    backend: ${B}\n    frontend: debian\n    image: ${A}\n    hosts: {h1: a}\n";
        let empty = ResolutionContext::isolated(Vec::<(String, String)>::new());
        match parse_str_with_context(yaml, &empty).unwrap_err() {
            ConfigError::EnvVarNotFound(names) => assert_eq!(names, "A, B"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_bad_version() {
        let yaml = format!("version: \"2.0\"\n{MINIMAL}");
        let err = parse_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported version"));
    }

    #[test]
    fn test_rejects_duplicate_addresses() {
        let yaml = "platforms:\n  p:\n    backend: local\n    frontend: debian\n    hosts:\n      h1: a\n      h2: a\n";
        let err = parse_str(yaml).unwrap_err();
        assert!(err.to_string().contains("several hosts"));
    }

    #[test]
    fn test_rejects_no_hosts() {
        let yaml = "platforms:\n  p:\n    backend: local\n    frontend: debian\n";
        assert!(matches!(
            parse_str(yaml),
            Err(ConfigError::ValidationError(msg)) if msg.contains("no hosts")
        ));
    }

    #[test]
    fn test_rejects_unknown_sequence_entry() {
        let yaml = format!("sequence: [web, cache]\n{MINIMAL}");
        let err = parse_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("'cache'"));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(parse_override("image=alpine").unwrap(), ("image".into(), json!("alpine")));
        assert_eq!(parse_override("count=3").unwrap(), ("count".into(), json!(3)));
        assert_eq!(parse_override("update=false").unwrap(), ("update".into(), json!(false)));
        assert_eq!(parse_override("params=-i -t").unwrap(), ("params".into(), json!("-i -t")));
        assert_eq!(parse_override("list=[a, b]").unwrap(), ("list".into(), json!("[a, b]")));
        assert_eq!(parse_override("empty=").unwrap(), ("empty".into(), Value::Null));
        assert!(matches!(
            parse_override("novalue"),
            Err(ConfigError::InvalidOverride(_))
        ));
        assert!(matches!(
            parse_override("=x"),
            Err(ConfigError::InvalidOverride(_))
        ));
    }
}
