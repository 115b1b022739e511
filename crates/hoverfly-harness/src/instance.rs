//! Connection details of a running Hoverfly instance
//!
//! An [`Instance`] is either supplied from outside through environment
//! variables (nothing is started or stopped by us) or built from the port
//! mappings of a container we started ourselves.

use std::collections::HashMap;

use crate::error::{HarnessError, Result};

/// Host of an externally managed instance
pub const HOST_ENV: &str = "HOVERFLY_HOST";
/// Admin API port of an externally managed instance
pub const ADMIN_PORT_ENV: &str = "HOVERFLY_ADMIN_PORT";
/// Proxy port of an externally managed instance
pub const PROXY_PORT_ENV: &str = "HOVERFLY_PROXY_PORT";

/// Host, admin port and proxy port of a Hoverfly instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    host: String,
    admin_port: u16,
    proxy_port: u16,
}

impl Instance {
    pub fn new(host: impl Into<String>, admin_port: u16, proxy_port: u16) -> Self {
        Self {
            host: host.into(),
            admin_port,
            proxy_port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn admin_port(&self) -> u16 {
        self.admin_port
    }

    pub fn proxy_port(&self) -> u16 {
        self.proxy_port
    }

    /// Base URL of the v2 admin API, e.g. `http://localhost:8888/api/v2`
    pub fn admin_endpoint(&self) -> String {
        format!("http://{}:{}/api/v2", self.host, self.admin_port)
    }

    /// URL to put into `HTTP_PROXY`/`HTTPS_PROXY`
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.proxy_port)
    }

    /// Build an instance from externally supplied connection details.
    ///
    /// Returns `Ok(None)` unless all three variables are present and
    /// non-empty, in which case the caller should provision a container.
    pub fn try_from_env(env: &HashMap<String, String>) -> Result<Option<Self>> {
        let get = |name: &str| env.get(name).map(String::as_str).filter(|v| !v.is_empty());

        let (Some(host), Some(admin_port), Some(proxy_port)) =
            (get(HOST_ENV), get(ADMIN_PORT_ENV), get(PROXY_PORT_ENV))
        else {
            return Ok(None);
        };

        Ok(Some(Self::new(
            host,
            parse_port(ADMIN_PORT_ENV, admin_port)?,
            parse_port(PROXY_PORT_ENV, proxy_port)?,
        )))
    }

    /// [`Instance::try_from_env`] over the current process environment
    pub fn try_from_process_env() -> Result<Option<Self>> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::try_from_env(&env)
    }

    /// Variables that point another process at this instance
    pub fn connection_env(&self) -> [(&'static str, String); 3] {
        [
            (HOST_ENV, self.host.clone()),
            (ADMIN_PORT_ENV, self.admin_port.to_string()),
            (PROXY_PORT_ENV, self.proxy_port.to_string()),
        ]
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    value.trim().parse().map_err(|_| HarnessError::InvalidEnv {
        name: name.to_string(),
        message: format!("expected a port number, got '{}'", value),
    })
}
