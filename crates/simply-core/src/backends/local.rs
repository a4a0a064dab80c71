//! Local backend: every host is the machine running simply
//!
//! Useful for tests and dry runs. Commands run through the local shell with
//! `SIMPLY_HOST` and `SIMPLY_ADDRESS` exported so scripts can tell hosts apart.
//! Lifecycle steps do nothing.

use async_trait::async_trait;
use command_executor::{Command, CommandResult, ExecOptions, ProcessExecutor};
use serde_json::Value;
use simply_config::PlatformSpec;
use tracing::debug;

use super::{Backend, command_capabilities, invoke_command_operation};
use crate::capability::{Args, CapabilitySet};
use crate::hosts::Host;
use crate::{Error, Result};

/// Registered name of the local backend
pub const LOCAL: &str = "local";

/// Runs every host's commands on the local machine
#[derive(Debug)]
pub struct LocalBackend {
    executor: ProcessExecutor,
    capabilities: CapabilitySet,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::with_executor(ProcessExecutor::new())
    }
}

impl LocalBackend {
    /// Create a local backend using `sh`
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a local backend with a specific executor
    pub fn with_executor(executor: ProcessExecutor) -> Self {
        Self {
            executor,
            capabilities: command_capabilities(LOCAL),
        }
    }

    /// Build from a platform spec; the optional `shell` key picks the shell
    pub fn from_spec(spec: &PlatformSpec) -> Result<Self> {
        let executor = match spec.option("shell") {
            None => ProcessExecutor::new(),
            Some(Value::String(shell)) => ProcessExecutor::with_shell(shell.clone()),
            Some(other) => {
                return Err(Error::configuration(format!(
                    "local backend: 'shell' must be a string, got {other}"
                )));
            }
        };
        Ok(Self::with_executor(executor))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn type_name(&self) -> &str {
        LOCAL
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "shell" => Some(Value::String(self.executor.shell().to_string())),
            _ => None,
        }
    }

    async fn run_command(
        &self,
        host: Host<'_>,
        command: &str,
        mut options: ExecOptions,
    ) -> Result<CommandResult> {
        if options.context().is_none() {
            options = options.with_context(host.id);
        }
        let command = Command::builder(self.executor.shell())
            .arg("-c")
            .arg(command)
            .env("SIMPLY_HOST", host.id)
            .env("SIMPLY_ADDRESS", host.address)
            .build();
        debug!(host = host.id, "running locally");
        Ok(self.executor.run(&command, &options).await?)
    }

    async fn invoke(&self, operation: &str, host: Host<'_>, args: &Args) -> Result<Value> {
        invoke_command_operation(self, operation, host, args)
            .await?
            .ok_or_else(|| {
                Error::configuration(format!("local backend has no operation '{operation}'"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOST: Host<'static> = Host {
        id: "h1",
        address: "addr-1",
    };

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[smol_potat::test]
    async fn test_host_environment_is_exported() {
        let backend = LocalBackend::new();
        let result = backend
            .run_command(HOST, "echo $SIMPLY_HOST $SIMPLY_ADDRESS", ExecOptions::new())
            .await
            .unwrap();
        assert_eq!(result.stdout, "h1 addr-1\n");
    }

    #[smol_potat::test]
    async fn test_failure_names_the_host() {
        let backend = LocalBackend::new();
        let err = backend
            .run_command(HOST, "exit 4", ExecOptions::new().raise_on_failure(true))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(4));
        assert!(err.to_string().contains("on h1"), "{err}");
    }

    #[smol_potat::test]
    async fn test_data_round_trip() {
        let backend = LocalBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("some file.txt");
        let path = path.to_str().unwrap();

        let exists = backend
            .invoke("path_exists", HOST, &args(json!({"path": path})))
            .await
            .unwrap();
        assert_eq!(exists, json!(false));

        backend
            .invoke("put_data", HOST, &args(json!({"path": path, "data": "one\n"})))
            .await
            .unwrap();
        backend
            .invoke(
                "put_data",
                HOST,
                &args(json!({"path": path, "data": "two\n", "append": true})),
            )
            .await
            .unwrap();

        let data = backend
            .invoke("get_data", HOST, &args(json!({"path": path})))
            .await
            .unwrap();
        assert_eq!(data, json!("one\ntwo\n"));
    }

    #[smol_potat::test]
    async fn test_run_command_operation_with_input() {
        let backend = LocalBackend::new();
        let value = backend
            .invoke(
                "run_command",
                HOST,
                &args(json!({"command": "tr a-z A-Z", "input": "abc"})),
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"stdout": "ABC", "stderr": "", "exit_code": 0}));
    }

    #[smol_potat::test]
    async fn test_get_data_missing_file_fails() {
        let backend = LocalBackend::new();
        let err = backend
            .invoke("get_data", HOST, &args(json!({"path": "/nonexistent/simply"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
    }

    #[test]
    fn test_shell_option() {
        let spec = PlatformSpec::new("local", "debian").with_option("shell", "bash");
        let backend = LocalBackend::from_spec(&spec).unwrap();
        assert_eq!(backend.attribute("shell"), Some(json!("bash")));

        let spec = PlatformSpec::new("local", "debian").with_option("shell", 3);
        assert!(LocalBackend::from_spec(&spec).is_err());
    }
}
