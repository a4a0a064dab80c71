//! Debian and Alpine frontends
//!
//! Both families share one implementation; they differ only in the commands
//! they build for packages and accounts.

use async_trait::async_trait;
use command_executor::{Command, ExecOptions};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

use super::Frontend;
use crate::backends::Backend;
use crate::capability::{
    Args, CapabilitySet, optional_bool, optional_str, required_str, string_list,
};
use crate::hosts::Host;
use crate::policy::AggregationPolicy;
use crate::{Error, Result};

/// Supported OS families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Debian and derivatives (`apt-get`, `dpkg`, shadow utilities)
    Debian,
    /// Alpine (`apk`, busybox account tools)
    Alpine,
}

impl Family {
    /// Registered frontend name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debian => "debian",
            Self::Alpine => "alpine",
        }
    }

    /// Package manager program
    pub fn package_manager(&self) -> &'static str {
        match self {
            Self::Debian => "apt-get",
            Self::Alpine => "apk",
        }
    }

    /// Refresh the package index; `install_package` runs this on every call unless `update` is false
    pub fn update_command(&self) -> Command {
        match self {
            Self::Debian => Command::builder("apt-get").args(["update", "-q"]).build(),
            Self::Alpine => Command::builder("apk").arg("update").build(),
        }
    }

    /// Install packages without prompting
    pub fn install_command(&self, packages: &[String]) -> Command {
        match self {
            Self::Debian => Command::builder("apt-get")
                .args(["install", "-y", "-q"])
                .args(packages.iter().map(String::as_str))
                .env("DEBIAN_FRONTEND", "noninteractive")
                .build(),
            Self::Alpine => Command::builder("apk")
                .args(["add", "--no-progress"])
                .args(packages.iter().map(String::as_str))
                .build(),
        }
    }

    /// Exits with 0 iff the package is installed
    pub fn installed_command(&self, package: &str) -> Command {
        match self {
            Self::Debian => Command::builder("dpkg").args(["-s", package]).build(),
            Self::Alpine => Command::builder("apk").args(["info", "-e", package]).build(),
        }
    }

    /// Create a user with a home directory
    pub fn create_user_command(&self, name: &str, home: Option<&str>) -> Command {
        match self {
            Self::Debian => Command::builder("useradd")
                .arg("-m")
                .arg_opt("-d", home)
                .args(["-s", "/bin/sh", name])
                .build(),
            Self::Alpine => Command::builder("adduser")
                .arg("-D")
                .arg_opt("-h", home)
                .arg(name)
                .build(),
        }
    }

    /// Delete a user and its home directory
    pub fn delete_user_command(&self, name: &str) -> Command {
        match self {
            Self::Debian => Command::builder("userdel").args(["-r", name]).build(),
            Self::Alpine => Command::builder("deluser")
                .args(["--remove-home", name])
                .build(),
        }
    }

    /// Add an existing user to an existing group
    pub fn add_to_group_command(&self, user: &str, group: &str) -> Command {
        match self {
            Self::Debian => Command::builder("usermod")
                .args(["-a", "-G", group, user])
                .build(),
            Self::Alpine => Command::builder("addgroup").args([user, group]).build(),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exits with 0 iff the user exists
pub fn user_exists_command(name: &str) -> Command {
    Command::builder("id").args(["-u", name]).build()
}

/// Parse `/etc/os-release` into a JSON object, unquoting values
pub fn parse_os_release(text: &str) -> Map<String, Value> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.to_string(), Value::String(value.to_string()))
        })
        .collect()
}

/// Frontend for one [`Family`]
#[derive(Debug)]
pub struct UnixFrontend {
    family: Family,
    capabilities: CapabilitySet,
}

impl UnixFrontend {
    /// Create a frontend for a family
    pub fn new(family: Family) -> Self {
        let capabilities = CapabilitySet::new(family.as_str())
            .with_operation(
                "install_package",
                AggregationPolicy::CollapseSelf,
                "Install packages; args: package (name or list), update (refresh the package index first on every call, default true)",
            )
            .with_operation(
                "package_installed",
                AggregationPolicy::AllTrue,
                "Whether every package is installed; args: package",
            )
            .with_operation(
                "create_user",
                AggregationPolicy::CollapseSelf,
                "Create a user; args: name, home",
            )
            .with_operation(
                "delete_user",
                AggregationPolicy::CollapseSelf,
                "Delete a user and its home; args: name",
            )
            .with_operation(
                "user_exists",
                AggregationPolicy::AllTrue,
                "Whether a user exists; args: name",
            )
            .with_operation(
                "add_to_group",
                AggregationPolicy::CollapseSelf,
                "Add a user to a group; args: user, group",
            )
            .with_operation(
                "os_release",
                AggregationPolicy::Map,
                "Parsed /etc/os-release",
            );
        Self {
            family,
            capabilities,
        }
    }

    /// The family this frontend drives
    pub fn family(&self) -> Family {
        self.family
    }
}

async fn run_strict(backend: &dyn Backend, host: Host<'_>, command: &Command) -> Result<String> {
    let options = ExecOptions::new()
        .raise_on_failure(true)
        .with_context(host.id);
    let result = backend
        .run_command(host, &command.to_shell_string(), options)
        .await?;
    Ok(result.stdout)
}

#[async_trait]
impl Frontend for UnixFrontend {
    fn type_name(&self) -> &str {
        self.family.as_str()
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "family" => Some(Value::String(self.family.as_str().to_string())),
            "package_manager" => Some(Value::String(self.family.package_manager().to_string())),
            _ => None,
        }
    }

    async fn invoke(
        &self,
        backend: &dyn Backend,
        operation: &str,
        host: Host<'_>,
        args: &Args,
    ) -> Result<Value> {
        let family = self.family;
        debug!(%family, operation, host = host.id, "frontend operation");

        match operation {
            "install_package" => {
                let packages = string_list(args, operation, "package")?;
                if optional_bool(args, operation, "update", true)? {
                    run_strict(backend, host, &family.update_command()).await?;
                }
                run_strict(backend, host, &family.install_command(&packages)).await?;
                Ok(Value::Null)
            }
            "package_installed" => {
                for package in string_list(args, operation, "package")? {
                    let command = family.installed_command(&package).to_shell_string();
                    if !backend.test_command(host, &command).await? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "create_user" => {
                let name = required_str(args, operation, "name")?;
                let home = optional_str(args, operation, "home")?;
                run_strict(backend, host, &family.create_user_command(name, home)).await?;
                Ok(Value::Null)
            }
            "delete_user" => {
                let name = required_str(args, operation, "name")?;
                run_strict(backend, host, &family.delete_user_command(name)).await?;
                Ok(Value::Null)
            }
            "user_exists" => {
                let name = required_str(args, operation, "name")?;
                let command = user_exists_command(name).to_shell_string();
                Ok(Value::Bool(backend.test_command(host, &command).await?))
            }
            "add_to_group" => {
                let user = required_str(args, operation, "user")?;
                let group = required_str(args, operation, "group")?;
                run_strict(backend, host, &family.add_to_group_command(user, group)).await?;
                Ok(Value::Null)
            }
            "os_release" => {
                let command = Command::builder("cat").arg("/etc/os-release").build();
                let text = run_strict(backend, host, &command).await?;
                Ok(Value::Object(parse_os_release(&text)))
            }
            other => Err(Error::configuration(format!(
                "{family} frontend has no operation '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalBackend;
    use serde_json::json;

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_debian_commands() {
        let f = Family::Debian;
        let packages = vec!["curl".to_string(), "git".to_string()];
        assert_eq!(f.update_command().to_string(), "apt-get update -q");
        assert_eq!(
            f.install_command(&packages).to_string(),
            "DEBIAN_FRONTEND=noninteractive apt-get install -y -q curl git"
        );
        assert_eq!(f.installed_command("curl").to_string(), "dpkg -s curl");
        assert_eq!(
            f.create_user_command("bob", Some("/srv/bob")).to_string(),
            "useradd -m -d /srv/bob -s /bin/sh bob"
        );
        assert_eq!(f.delete_user_command("bob").to_string(), "userdel -r bob");
        assert_eq!(
            f.add_to_group_command("bob", "docker").to_string(),
            "usermod -a -G docker bob"
        );
    }

    #[test]
    fn test_install_package_describes_index_refresh() {
        let frontend = UnixFrontend::new(Family::Debian);
        let install = frontend
            .capabilities()
            .operations()
            .find(|op| op.name == "install_package")
            .unwrap();
        assert!(install.description.contains("on every call"), "{}", install.description);
    }

    #[test]
    fn test_alpine_commands() {
        let f = Family::Alpine;
        assert_eq!(
            f.install_command(&["curl".to_string()]).to_string(),
            "apk add --no-progress curl"
        );
        assert_eq!(f.installed_command("curl").to_string(), "apk info -e curl");
        assert_eq!(
            f.create_user_command("bob", None).to_string(),
            "adduser -D bob"
        );
        assert_eq!(
            f.delete_user_command("bob").to_string(),
            "deluser --remove-home bob"
        );
        assert_eq!(
            f.add_to_group_command("bob", "wheel").to_string(),
            "addgroup bob wheel"
        );
    }

    #[test]
    fn test_user_names_are_quoted() {
        assert_eq!(
            user_exists_command("x; rm -rf /").to_string(),
            "id -u 'x; rm -rf /'"
        );
    }

    #[test]
    fn test_parse_os_release() {
        let text = "# comment\nNAME=\"Alpine Linux\"\nID=alpine\nVERSION_ID=3.19.1\nPRETTY_NAME='Alpine v3.19'\n\n";
        let parsed = parse_os_release(text);
        assert_eq!(
            Value::Object(parsed),
            json!({
                "NAME": "Alpine Linux",
                "ID": "alpine",
                "VERSION_ID": "3.19.1",
                "PRETTY_NAME": "Alpine v3.19",
            })
        );
    }

    #[test]
    fn test_attributes() {
        let frontend = UnixFrontend::new(Family::Alpine);
        assert_eq!(frontend.type_name(), "alpine");
        assert_eq!(frontend.attribute("package_manager"), Some(json!("apk")));
        assert_eq!(frontend.attribute("family"), Some(json!("alpine")));
        assert!(frontend.attribute("image").is_none());
        assert_eq!(
            frontend.capabilities().get("package_installed").unwrap().policy,
            AggregationPolicy::AllTrue
        );
    }

    #[smol_potat::test]
    async fn test_commands_go_through_the_backend() {
        let frontend = UnixFrontend::new(Family::Debian);
        let backend = LocalBackend::new();
        let host = Host {
            id: "h1",
            address: "localhost",
        };

        let exists = frontend
            .invoke(
                &backend,
                "user_exists",
                host,
                &args(json!({"name": "simply-no-such-user-4242"})),
            )
            .await
            .unwrap();
        assert_eq!(exists, json!(false));

        let err = frontend
            .invoke(&backend, "create_user", host, &Args::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let err = frontend
            .invoke(&backend, "reboot", host, &Args::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("debian frontend has no operation 'reboot'"));
    }
}
