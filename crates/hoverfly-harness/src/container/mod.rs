//! Hoverfly containers started and destroyed by the harness

mod docker;

pub use docker::DockerCli;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::admin::AdminClient;
use crate::error::{HarnessError, ReadinessPhase, Result};
use crate::instance::Instance;
use crate::poll::{poll_until, PollError};

/// Default Hoverfly image
pub const IMAGE: &str = "spectolabs/hoverfly:v1.3.2";
/// Prefix of generated container names
pub const CONTAINER_BASENAME: &str = "test-hoverfly";
/// Port the admin API listens on inside the container
pub const ADMIN_CONTAINER_PORT: u16 = 8888;
/// Port the proxy listens on inside the container
pub const PROXY_CONTAINER_PORT: u16 = 8500;
/// Host that published container ports are reached on
pub const MANAGED_HOST: &str = "localhost";

/// One host-side binding of a published container port
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "HostIp", default)]
    pub host_ip: String,
    #[serde(rename = "HostPort", default)]
    pub host_port: String,
}

/// Published ports keyed by `"<port>/tcp"`. An empty list means the
/// runtime has not published that port yet.
pub type PortMap = BTreeMap<String, Vec<PortBinding>>;

/// Everything needed to create a Hoverfly container
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub admin_port: u16,
    pub proxy_port: u16,
    /// Replaces the image's default command when non-empty
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: format!("{}-{}", CONTAINER_BASENAME, uuid::Uuid::new_v4().simple()),
            admin_port: ADMIN_CONTAINER_PORT,
            proxy_port: PROXY_CONTAINER_PORT,
            command: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Port keys the runtime reports mappings under
    pub fn port_keys(&self) -> [String; 2] {
        [port_key(self.admin_port), port_key(self.proxy_port)]
    }
}

pub fn port_key(port: u16) -> String {
    format!("{}/tcp", port)
}

/// Operations the harness needs from a container engine
pub trait ContainerRuntime {
    fn image_exists(&self, image: &str) -> Result<bool>;
    fn pull_image(&self, image: &str) -> Result<()>;
    /// Create (but do not start) a container, returning its id
    fn create(&self, spec: &ContainerSpec) -> Result<String>;
    fn start(&self, id: &str) -> Result<()>;
    fn published_ports(&self, id: &str) -> Result<PortMap>;
    /// Kill with SIGKILL
    fn kill(&self, id: &str) -> Result<()>;
    /// Remove the container together with its volumes
    fn remove(&self, id: &str) -> Result<()>;
}

/// Kills and removes a created container when dropped
struct ContainerGuard {
    runtime: Box<dyn ContainerRuntime>,
    id: String,
}

impl ContainerGuard {
    /// The runtime may publish ports some time after the container starts
    fn wait_for_ports(&self, spec: &ContainerSpec, timeout: Duration) -> Result<PortMap> {
        let wanted = spec.port_keys();
        let mut ports = PortMap::new();

        poll_until(
            || {
                ports = self.runtime.published_ports(&self.id)?;
                Ok(wanted
                    .iter()
                    .all(|key| ports.get(key).is_some_and(|b| !b.is_empty())))
            },
            timeout,
        )
        .map_err(|e| poll_error(e, ReadinessPhase::PortExposure, timeout))?;

        Ok(ports)
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        // No graceful shutdown: state is thrown away with the container
        if let Err(e) = self.runtime.kill(&self.id) {
            tracing::warn!(id = %self.id, error = %e, "failed to kill Hoverfly container");
        }
        if let Err(e) = self.runtime.remove(&self.id) {
            tracing::warn!(id = %self.id, error = %e, "failed to remove Hoverfly container");
        } else {
            tracing::debug!(id = %self.id, "removed Hoverfly container");
        }
    }
}

/// A running, ready Hoverfly container, killed and removed on drop
pub struct ManagedContainer {
    guard: ContainerGuard,
    instance: Instance,
}

impl std::fmt::Debug for ManagedContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedContainer")
            .field("id", &self.guard.id)
            .field("instance", &self.instance)
            .finish()
    }
}

impl ManagedContainer {
    /// Pull the image if needed, create and start a container and wait for
    /// Hoverfly to answer on its admin port.
    ///
    /// `timeout` applies separately to port exposure and admin readiness.
    /// If either wait fails the container is torn down before returning.
    pub fn acquire(
        runtime: Box<dyn ContainerRuntime>,
        spec: &ContainerSpec,
        timeout: Duration,
    ) -> Result<Self> {
        if !runtime.image_exists(&spec.image)? {
            tracing::info!(image = %spec.image, "pulling Hoverfly image");
            runtime.pull_image(&spec.image)?;
        }

        let id = runtime.create(spec)?;
        let guard = ContainerGuard { runtime, id };
        tracing::info!(id = %guard.id, name = %spec.name, "created Hoverfly container");

        guard.runtime.start(&guard.id)?;

        let ports = guard.wait_for_ports(spec, timeout)?;
        let instance = Instance::new(
            MANAGED_HOST,
            host_port(&ports, spec.admin_port)?,
            host_port(&ports, spec.proxy_port)?,
        );

        wait_until_ready(&AdminClient::new(&instance), timeout)?;
        tracing::info!(
            admin = %instance.admin_endpoint(),
            proxy = %instance.proxy_url(),
            "Hoverfly container ready"
        );

        Ok(Self { guard, instance })
    }

    pub fn id(&self) -> &str {
        &self.guard.id
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

/// Poll the admin API until any HTTP exchange completes
pub fn wait_until_ready(client: &AdminClient, timeout: Duration) -> Result<()> {
    poll_until(|| client.is_ready(), timeout)
        .map_err(|e| poll_error(e, ReadinessPhase::AdminApi, timeout))
}

fn poll_error(err: PollError<HarnessError>, phase: ReadinessPhase, timeout: Duration) -> HarnessError {
    match err {
        PollError::TimedOut => HarnessError::Timeout { phase, timeout },
        PollError::Aborted(e) => e,
    }
}

fn host_port(ports: &PortMap, container_port: u16) -> Result<u16> {
    let key = port_key(container_port);
    let binding = ports
        .get(&key)
        .and_then(|b| b.first())
        .ok_or_else(|| HarnessError::Container(format!("port {} is not published", key)))?;

    binding.host_port.parse().map_err(|_| {
        HarnessError::Container(format!(
            "invalid host port '{}' for {}",
            binding.host_port, key
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::net::TcpListener;
    use std::rc::Rc;

    /// Scripted runtime recording every call
    #[derive(Default)]
    struct FakeRuntime {
        calls: Rc<RefCell<Vec<String>>>,
        image_present: bool,
        fail_pull: bool,
        /// Polls that report unpublished ports before the mapping appears
        unpublished_polls: RefCell<usize>,
        admin_port: String,
    }

    impl FakeRuntime {
        fn log(&self, call: impl Into<String>) {
            self.calls.borrow_mut().push(call.into());
        }
    }

    impl ContainerRuntime for FakeRuntime {
        fn image_exists(&self, image: &str) -> Result<bool> {
            self.log(format!("image_exists {}", image));
            Ok(self.image_present)
        }

        fn pull_image(&self, image: &str) -> Result<()> {
            self.log(format!("pull {}", image));
            if self.fail_pull {
                return Err(HarnessError::Container("pull access denied".to_string()));
            }
            Ok(())
        }

        fn create(&self, spec: &ContainerSpec) -> Result<String> {
            self.log(format!("create {} {}", spec.image, spec.command.join(" ")));
            Ok("c0ffee".to_string())
        }

        fn start(&self, id: &str) -> Result<()> {
            self.log(format!("start {}", id));
            Ok(())
        }

        fn published_ports(&self, _id: &str) -> Result<PortMap> {
            self.log("ports");
            let mut remaining = self.unpublished_polls.borrow_mut();
            let mut ports = PortMap::new();
            if *remaining > 0 {
                *remaining -= 1;
                ports.insert(port_key(ADMIN_CONTAINER_PORT), Vec::new());
                return Ok(ports);
            }
            let binding = |port: &str| {
                vec![PortBinding {
                    host_ip: "0.0.0.0".to_string(),
                    host_port: port.to_string(),
                }]
            };
            ports.insert(port_key(ADMIN_CONTAINER_PORT), binding(&self.admin_port));
            ports.insert(port_key(PROXY_CONTAINER_PORT), binding("49153"));
            Ok(ports)
        }

        fn kill(&self, id: &str) -> Result<()> {
            self.log(format!("kill {}", id));
            Ok(())
        }

        fn remove(&self, id: &str) -> Result<()> {
            self.log(format!("remove {}", id));
            Ok(())
        }
    }

    /// A port nothing listens on
    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_spec_defaults() {
        let spec = ContainerSpec::new(IMAGE);
        assert!(spec.name.starts_with("test-hoverfly-"));
        assert_eq!(spec.port_keys(), ["8888/tcp".to_string(), "8500/tcp".to_string()]);
        assert_ne!(spec.name, ContainerSpec::new(IMAGE).name);
    }

    #[test]
    fn test_pull_failure_is_fatal() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let runtime = FakeRuntime {
            calls: calls.clone(),
            fail_pull: true,
            ..Default::default()
        };

        let err = ManagedContainer::acquire(
            Box::new(runtime),
            &ContainerSpec::new(IMAGE),
            Duration::from_millis(50),
        )
        .unwrap_err();

        assert!(matches!(err, HarnessError::Container(_)));
        assert_eq!(
            *calls.borrow(),
            vec![format!("image_exists {}", IMAGE), format!("pull {}", IMAGE)]
        );
    }

    #[test]
    fn test_admin_timeout_tears_container_down() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let runtime = FakeRuntime {
            calls: calls.clone(),
            image_present: true,
            unpublished_polls: RefCell::new(2),
            admin_port: closed_port().to_string(),
            ..Default::default()
        };
        let spec = ContainerSpec::new(IMAGE).with_command(vec!["-webserver".to_string()]);

        let err = ManagedContainer::acquire(Box::new(runtime), &spec, Duration::from_millis(100))
            .unwrap_err();

        assert!(matches!(
            err,
            HarnessError::Timeout {
                phase: ReadinessPhase::AdminApi,
                ..
            }
        ));

        let calls = calls.borrow();
        assert!(!calls.iter().any(|c| c.starts_with("pull")));
        assert_eq!(calls[1], format!("create {} -webserver", IMAGE));
        assert_eq!(calls.iter().filter(|c| *c == "ports").count(), 3);
        assert_eq!(&calls[calls.len() - 2..], ["kill c0ffee", "remove c0ffee"]);
    }

    #[test]
    fn test_port_timeout_names_phase() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let runtime = FakeRuntime {
            calls: calls.clone(),
            image_present: true,
            unpublished_polls: RefCell::new(usize::MAX),
            ..Default::default()
        };

        let err = ManagedContainer::acquire(
            Box::new(runtime),
            &ContainerSpec::new(IMAGE),
            Duration::from_millis(30),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            HarnessError::Timeout {
                phase: ReadinessPhase::PortExposure,
                ..
            }
        ));
        assert!(err.to_string().contains("port exposure"));
        assert_eq!(calls.borrow().last().unwrap(), "remove c0ffee");
    }

    #[test]
    fn test_host_port_parsing() {
        let mut ports = PortMap::new();
        ports.insert(
            "8888/tcp".to_string(),
            vec![PortBinding {
                host_ip: "0.0.0.0".to_string(),
                host_port: "32771".to_string(),
            }],
        );
        ports.insert(
            "8500/tcp".to_string(),
            vec![PortBinding {
                host_ip: "0.0.0.0".to_string(),
                host_port: "not-a-port".to_string(),
            }],
        );

        assert_eq!(host_port(&ports, 8888).unwrap(), 32771);
        assert!(host_port(&ports, 8500).is_err());
        assert!(host_port(&ports, 9999).is_err());
    }
}
