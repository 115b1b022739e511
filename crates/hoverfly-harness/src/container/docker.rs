//! Container runtime backed by the `docker` CLI

use std::collections::BTreeMap;
use std::process::{Command, Stdio};

use super::{port_key, ContainerRuntime, ContainerSpec, PortBinding, PortMap};
use crate::error::{HarnessError, Result};

/// Drives containers through the `docker` binary (or a compatible one such
/// as `podman`)
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run a subcommand and return its trimmed stdout
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                HarnessError::Container(format!(
                    "failed to run {} (is Docker installed?): {}",
                    self.binary, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::Container(format!(
                "{} {} failed: {}",
                self.binary,
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for `docker create`
fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];

    // Publish to a random host port; the mapping is read back afterwards
    for port in [spec.proxy_port, spec.admin_port] {
        args.push("--publish".to_string());
        args.push(port_key(port));
    }

    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Parse `docker inspect --format '{{json .NetworkSettings.Ports}}'`.
/// Docker reports ports it has not bound yet as `null`.
fn parse_ports(raw: &str) -> Result<PortMap> {
    if raw.is_empty() || raw == "null" {
        return Ok(PortMap::new());
    }

    let ports: BTreeMap<String, Option<Vec<PortBinding>>> = serde_json::from_str(raw)?;
    Ok(ports
        .into_iter()
        .map(|(key, bindings)| (key, bindings.unwrap_or_default()))
        .collect())
}

impl ContainerRuntime for DockerCli {
    fn image_exists(&self, image: &str) -> Result<bool> {
        let status = Command::new(&self.binary)
            .args(["image", "inspect", image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                HarnessError::Container(format!("failed to inspect Docker image: {}", e))
            })?;

        Ok(status.success())
    }

    fn pull_image(&self, image: &str) -> Result<()> {
        self.run(&["pull", image]).map(|_| ()).map_err(|e| {
            HarnessError::Container(format!("failed to pull image '{}': {}", image, e))
        })
    }

    fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let args = create_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args)
    }

    fn start(&self, id: &str) -> Result<()> {
        self.run(&["start", id]).map(|_| ())
    }

    fn published_ports(&self, id: &str) -> Result<PortMap> {
        let raw = self.run(&["inspect", "--format", "{{json .NetworkSettings.Ports}}", id])?;
        parse_ports(&raw)
    }

    fn kill(&self, id: &str) -> Result<()> {
        self.run(&["kill", "--signal=KILL", id]).map(|_| ())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.run(&["rm", "--force", "--volumes", id]).map(|_| ())
    }
}
