//! Docker backend: one container per host
//!
//! Host addresses are container names. Images are pulled or built during
//! `prepare`, containers are started detached with their name as hostname,
//! and commands run through `docker exec`.

use async_trait::async_trait;
use command_executor::{Command, CommandResult, ExecOptions, ProcessExecutor, shell};
use indexmap::{IndexMap, IndexSet};
use serde_json::{Value, json};
use simply_config::PlatformSpec;
use tracing::{debug, info, warn};

use super::{Backend, ResetMode, command_capabilities, invoke_command_operation, strict};
use crate::capability::{Args, CapabilitySet, required_str};
use crate::hosts::{Host, HostSet};
use crate::policy::AggregationPolicy;
use crate::text::{ColumnFilter, extract_column, filter_column};
use crate::{Error, Result};

/// Registered name of the docker backend
pub const DOCKER: &str = "docker";

/// `image_spec` value asking for `docker pull`
pub const PULL: &str = ".pull";

/// Where a missing image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// `docker pull`
    Pull,
    /// `docker build` from a Dockerfile fed on stdin
    Inline(String),
    /// `docker build` from a context directory
    Context(String),
}

impl ImageSource {
    /// Interpret an `image_spec` value; no spec means pull
    pub fn parse(spec: Option<&str>) -> Self {
        match spec {
            None | Some(PULL) => Self::Pull,
            Some(spec) if spec.contains('\n') => Self::Inline(spec.to_string()),
            Some(path) => Self::Context(path.to_string()),
        }
    }
}

/// Command fetching or building `image`, with the data to feed on stdin
pub fn image_command(image: &str, source: &ImageSource) -> (Command, Option<String>) {
    match source {
        ImageSource::Pull => (Command::builder("docker").args(["pull", image]).build(), None),
        ImageSource::Inline(dockerfile) => (
            Command::builder("docker")
                .args(["build", "-t", image, "-"])
                .build(),
            Some(dockerfile.clone()),
        ),
        ImageSource::Context(path) => (
            Command::builder("docker")
                .args(["build", "-t", image, path.as_str()])
                .build(),
            None,
        ),
    }
}

/// `docker run` for one host; `parameters` is inserted verbatim before the image
pub fn run_container_command(container: &str, image: &str, parameters: Option<&str>) -> Command {
    let builder = Command::builder("docker").args(["run", "-d", "--name", container, "-h", container]);
    match parameters.map(str::trim).filter(|p| !p.is_empty()) {
        Some(parameters) => builder
            .raw(format!("{parameters} {}", shell::quote(image)))
            .build(),
        None => builder.arg(image).build(),
    }
}

/// `docker exec` running `command` through `sh -c` in `container`
pub fn exec_command(container: &str, user: Option<&str>, interactive: bool, command: &str) -> Command {
    Command::builder("docker")
        .arg("exec")
        .arg_if(interactive, "-i")
        .arg_opt("-u", user)
        .args([container, "sh", "-c", command])
        .build()
}

/// `docker cp` of a local path into a container
pub fn copy_command(source: &str, container: &str, dest: &str) -> Command {
    let target = format!("{container}:{dest}");
    Command::builder("docker")
        .args(["cp", source, target.as_str()])
        .build()
}

/// Streams the content of a local directory into a container directory
pub fn copy_directory_command(source: &str, container: &str, dest: &str) -> Command {
    let extract = Command::builder("docker")
        .args(["exec", "-i", container, "tar", "zx", "-C", dest])
        .build();
    Command::builder("tar")
        .args(["zc", "-C", source, "."])
        .raw(format!("| {extract}"))
        .build()
}

/// `docker inspect` printing the container IP
pub fn container_ip_command(container: &str) -> Command {
    Command::builder("docker")
        .args([
            "inspect",
            "--format",
            "{{ .NetworkSettings.IPAddress }}",
            container,
        ])
        .build()
}

/// Image references as `repository:tag` from `docker images` output
pub fn parse_images(output: &str) -> Vec<String> {
    let repositories = extract_column(output.lines(), 0, 1);
    let tags = extract_column(output.lines(), 1, 1);
    repositories
        .into_iter()
        .zip(tags)
        .map(|(repository, tag)| format!("{repository}:{tag}"))
        .collect()
}

/// Container names from `docker ps` output
pub fn parse_container_names(output: &str) -> Vec<String> {
    extract_column(output.lines(), -1, 1)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Names of containers created from `image`, from `docker ps -a` output
pub fn parse_containers_of_image(output: &str, image: &str) -> Vec<String> {
    let rows = filter_column(output.lines(), 1, 1, ColumnFilter::Eq(image));
    extract_column(rows, -1, 0)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// `image` with an explicit tag, as `docker images` lists it
pub fn normalize_image(image: &str) -> String {
    let name = image.rsplit('/').next().unwrap_or(image);
    if name.contains(':') || name.contains('@') {
        image.to_string()
    } else {
        format!("{image}:latest")
    }
}

/// Per-host docker settings
#[derive(Debug)]
pub struct DockerBackend {
    executor: ProcessExecutor,
    capabilities: CapabilitySet,
    image: Option<String>,
    images: IndexMap<String, String>,
    image_spec: Option<String>,
    parameters: Option<Value>,
    user: Option<String>,
}

impl DockerBackend {
    /// Build from a platform spec.
    ///
    /// Every host needs an image, from `images` or the default `image`.
    pub fn from_spec(spec: &PlatformSpec) -> Result<Self> {
        let image = string_option(spec, "image")?;
        let images: IndexMap<String, String> = match spec.option("images") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                Error::configuration(format!("docker backend: 'images' must map hosts to images: {e}"))
            })?,
        };

        for id in spec.hosts.keys() {
            if image.is_none() && !images.contains_key(id) {
                return Err(Error::configuration(format!(
                    "docker backend: no image for host '{id}' (set 'image' or 'images.{id}')"
                )));
            }
        }

        let parameters = match spec.option("parameters") {
            None | Some(Value::Null) => None,
            Some(value @ (Value::String(_) | Value::Object(_))) => Some(value.clone()),
            Some(other) => {
                return Err(Error::configuration(format!(
                    "docker backend: 'parameters' must be a string or a per-host mapping, got {other}"
                )));
            }
        };

        Ok(Self {
            executor: ProcessExecutor::new(),
            capabilities: docker_capabilities(),
            image,
            images,
            image_spec: string_option(spec, "image_spec")?,
            parameters,
            user: string_option(spec, "user")?,
        })
    }

    /// Image used by a host
    pub fn image_for(&self, id: &str) -> Option<&str> {
        self.images
            .get(id)
            .or(self.image.as_ref())
            .map(String::as_str)
    }

    /// `docker run` parameters of a host
    pub fn parameters_for(&self, id: &str) -> Option<&str> {
        match &self.parameters {
            Some(Value::String(all)) => Some(all),
            Some(Value::Object(per_host)) => per_host.get(id).and_then(Value::as_str),
            _ => None,
        }
    }

    /// User commands run as, `root` when none is configured
    pub fn effective_user(&self) -> &str {
        self.user.as_deref().unwrap_or("root")
    }

    async fn docker(&self, command: &Command, options: ExecOptions) -> Result<CommandResult> {
        Ok(self.executor.run(command, &options).await?)
    }

    async fn docker_output(&self, args: &[&str]) -> Result<String> {
        let command = Command::builder("docker").args(args.iter().copied()).build();
        let result = self
            .docker(&command, ExecOptions::new().raise_on_failure(true))
            .await?;
        Ok(result.stdout)
    }

    async fn existing_images(&self) -> Result<Vec<String>> {
        Ok(parse_images(&self.docker_output(&["images"]).await?))
    }

    async fn containers(&self, all: bool) -> Result<Vec<String>> {
        let output = if all {
            self.docker_output(&["ps", "-a"]).await?
        } else {
            self.docker_output(&["ps"]).await?
        };
        Ok(parse_container_names(&output))
    }

    fn platform_images(&self, hosts: &HostSet) -> IndexSet<String> {
        hosts
            .ids()
            .filter_map(|id| self.image_for(id))
            .map(str::to_string)
            .collect()
    }

    async fn simple(&self, args: &[&str], context: &str) -> Result<()> {
        let command = Command::builder("docker").args(args.iter().copied()).build();
        self.docker(
            &command,
            ExecOptions::new()
                .raise_on_failure(true)
                .with_context(context),
        )
        .await?;
        Ok(())
    }

    async fn stop_containers(&self, hosts: &HostSet) -> Result<()> {
        let running = self.containers(false).await?;
        for host in hosts.iter().filter(|h| running.iter().any(|c| c == h.address)) {
            info!(container = host.address, "stopping container");
            self.simple(&["stop", host.address], host.id).await?;
        }
        Ok(())
    }

    async fn delete_containers(&self, hosts: &HostSet) -> Result<()> {
        let existing = self.containers(true).await?;
        for host in hosts.iter().filter(|h| existing.iter().any(|c| c == h.address)) {
            info!(container = host.address, "deleting container");
            self.simple(&["rm", "-f", host.address], host.id).await?;
        }
        Ok(())
    }

    async fn delete_images(&self, hosts: &HostSet, uproot: bool) -> Result<()> {
        let existing = self.existing_images().await?;
        for image in self.platform_images(hosts) {
            if !existing.contains(&normalize_image(&image)) {
                continue;
            }
            if uproot {
                let listing = self.docker_output(&["ps", "-a"]).await?;
                for container in parse_containers_of_image(&listing, &image) {
                    warn!(%container, %image, "deleting dependent container");
                    self.simple(&["rm", "-f", container.as_str()], &image).await?;
                }
            }
            info!(%image, "deleting image");
            self.simple(&["rmi", image.as_str()], &image).await?;
        }
        Ok(())
    }
}

fn string_option(spec: &PlatformSpec, key: &str) -> Result<Option<String>> {
    match spec.option(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::configuration(format!(
            "docker backend: '{key}' must be a string, got {other}"
        ))),
    }
}

fn docker_capabilities() -> CapabilitySet {
    command_capabilities(DOCKER)
        .with_operation(
            "put_file",
            AggregationPolicy::CollapseSelf,
            "Copy a local file into the container; args: source, path",
        )
        .with_operation(
            "put_directory",
            AggregationPolicy::CollapseSelf,
            "Copy a local directory's content into the container; args: source, path",
        )
        .with_operation(
            "container_ip",
            AggregationPolicy::Map,
            "IP address of the container",
        )
        .with_operation(
            "container_running",
            AggregationPolicy::AllTrue,
            "Whether the container is running",
        )
        .with_operation(
            "commit",
            AggregationPolicy::CollapseSelf,
            "Save the container as an image; args: image",
        )
}

#[async_trait]
impl Backend for DockerBackend {
    fn type_name(&self) -> &str {
        DOCKER
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "image" => self.image.clone().map(Value::String),
            "images" => Some(json!(self.images)),
            "image_spec" => self.image_spec.clone().map(Value::String),
            "parameters" => self.parameters.clone(),
            "user" => self.user.clone().map(Value::String),
            "effective_user" => Some(Value::String(self.effective_user().to_string())),
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
        let exec = exec_command(
            host.address,
            self.user.as_deref(),
            options.has_input(),
            command,
        );
        self.docker(&exec, options).await
    }

    async fn invoke(&self, operation: &str, host: Host<'_>, args: &Args) -> Result<Value> {
        if let Some(value) = invoke_command_operation(self, operation, host, args).await? {
            return Ok(value);
        }

        match operation {
            "put_file" => {
                let source = required_str(args, operation, "source")?;
                let path = required_str(args, operation, "path")?;
                self.docker(&copy_command(source, host.address, path), strict(host))
                    .await?;
                Ok(Value::Null)
            }
            "put_directory" => {
                let source = required_str(args, operation, "source")?;
                let path = required_str(args, operation, "path")?;
                let mkdir = format!("mkdir -p {}", shell::quote(path));
                self.run_command(host, &mkdir, strict(host)).await?;
                self.docker(
                    &copy_directory_command(source, host.address, path),
                    strict(host),
                )
                .await?;
                Ok(Value::Null)
            }
            "container_ip" => {
                let result = self
                    .docker(&container_ip_command(host.address), strict(host))
                    .await?;
                Ok(Value::String(result.stdout.trim().to_string()))
            }
            "container_running" => {
                let running = self.containers(false).await?;
                Ok(Value::Bool(running.iter().any(|c| c == host.address)))
            }
            "commit" => {
                let image = required_str(args, operation, "image")?;
                self.simple(&["commit", host.address, image], host.id)
                    .await?;
                Ok(Value::Null)
            }
            other => Err(Error::configuration(format!(
                "docker backend has no operation '{other}'"
            ))),
        }
    }

    async fn prepare(&self, hosts: &HostSet, reset: Option<ResetMode>) -> Result<()> {
        if let Some(mode) = reset {
            self.reset(hosts, mode).await?;
        }

        let existing = self.existing_images().await?;
        let source = ImageSource::parse(self.image_spec.as_deref());
        for image in self.platform_images(hosts) {
            if existing.contains(&normalize_image(&image)) {
                debug!(%image, "image present");
                continue;
            }
            let (command, input) = image_command(&image, &source);
            info!(%image, "fetching image: {command}");
            let mut options = ExecOptions::new()
                .raise_on_failure(true)
                .with_context(image.as_str());
            if let Some(input) = input {
                options = options.with_input(input);
            }
            self.docker(&command, options).await?;
        }
        Ok(())
    }

    async fn start(&self, hosts: &HostSet) -> Result<()> {
        let running = self.containers(false).await?;
        let existing = self.containers(true).await?;

        for host in hosts.iter() {
            if running.iter().any(|c| c == host.address) {
                debug!(container = host.address, "container already running");
                continue;
            }
            if existing.iter().any(|c| c == host.address) {
                warn!(container = host.address, "deleting stale container");
                self.simple(&["rm", "-f", host.address], host.id).await?;
            }

            let image = self.image_for(host.id).ok_or_else(|| {
                Error::configuration(format!("docker backend: no image for host '{}'", host.id))
            })?;
            let command = run_container_command(host.address, image, self.parameters_for(host.id));
            info!(container = host.address, "starting container: {command}");
            self.docker(&command, strict(host)).await?;
        }
        Ok(())
    }

    async fn reset(&self, hosts: &HostSet, mode: ResetMode) -> Result<()> {
        info!(%mode, "resetting docker hosts");
        match mode {
            ResetMode::Stop => self.stop_containers(hosts).await,
            ResetMode::RmContainer => {
                self.stop_containers(hosts).await?;
                self.delete_containers(hosts).await
            }
            ResetMode::RmImage => {
                self.stop_containers(hosts).await?;
                self.delete_containers(hosts).await?;
                self.delete_images(hosts, false).await
            }
            ResetMode::Uproot => self.delete_images(hosts, true).await,
        }
    }
}
