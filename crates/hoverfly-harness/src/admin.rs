use serde::{Deserialize, Serialize};
use ureq::Agent;

use crate::error::{HarnessError, Result};
use crate::instance::Instance;
use crate::simulation::Simulation;

/// Hoverfly operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Proxy real traffic and record request/response pairs
    Capture,
    /// Serve responses from the uploaded simulation
    Simulate,
}

/// Arguments accepted by capture mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureArguments {
    #[serde(rename = "headersWhitelist")]
    pub headers_whitelist: Vec<String>,
    pub stateful: bool,
}

impl CaptureArguments {
    /// Capture every request header
    pub fn all_headers(stateful: bool) -> Self {
        Self {
            headers_whitelist: vec!["*".to_string()],
            stateful,
        }
    }
}

#[derive(Debug, Serialize)]
struct ModeRequest<'a> {
    mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<&'a CaptureArguments>,
}

/// One entry of `GET /logs`
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LogsResponse {
    #[serde(default)]
    logs: Vec<LogEntry>,
}

/// Client for the Hoverfly v2 admin API
///
/// The agent ignores `HTTP_PROXY`/`HTTPS_PROXY` so admin calls never loop
/// back through Hoverfly's own proxy while a session has them set.
pub struct AdminClient {
    agent: Agent,
    base_url: String,
}

impl AdminClient {
    /// Create a client for an instance's admin endpoint
    pub fn new(instance: &Instance) -> Self {
        Self::with_base_url(&instance.admin_endpoint())
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(base_url: &str) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .proxy(None)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check response status and return error if not successful
    fn check_response(
        &self,
        mut response: ureq::http::Response<ureq::Body>,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        let status = response.status().as_u16();

        if (200..300).contains(&status) {
            return Ok(response);
        }

        let body = response
            .body_mut()
            .read_to_string()
            .unwrap_or_else(|_| String::new());

        // Hoverfly reports failures as {"error": "..."}
        let message = if let Ok(error_response) = serde_json::from_str::<serde_json::Value>(&body) {
            error_response
                .get("error")
                .and_then(|m| m.as_str())
                .unwrap_or(&body)
                .to_string()
        } else if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            body
        };

        Err(HarnessError::Api { status, message })
    }

    /// Probe `GET /state`.
    ///
    /// Any completed HTTP exchange counts as ready, whatever its status.
    /// Connection-level failures mean "not ready yet"; anything else is
    /// returned as an error.
    pub fn is_ready(&self) -> Result<bool> {
        match self.agent.get(&self.url("/state")).call() {
            Ok(_) => Ok(true),
            Err(
                ureq::Error::Io(_)
                | ureq::Error::ConnectionFailed
                | ureq::Error::HostNotFound
                | ureq::Error::Timeout(_),
            ) => Ok(false),
            Err(e) => Err(HarnessError::Http(e)),
        }
    }

    /// Switch mode. `arguments` only apply to capture mode.
    pub fn set_mode(&self, mode: Mode, arguments: Option<&CaptureArguments>) -> Result<()> {
        tracing::debug!(?mode, ?arguments, "switching Hoverfly mode");

        let response = self
            .agent
            .put(&self.url("/hoverfly/mode"))
            .send_json(&ModeRequest { mode, arguments })
            .map_err(HarnessError::Http)?;

        self.check_response(response)?;
        Ok(())
    }

    /// Upload a simulation verbatim
    pub fn put_simulation(&self, raw: &str) -> Result<()> {
        let response = self
            .agent
            .put(&self.url("/simulation"))
            .header("Content-Type", "application/json")
            .send(raw)
            .map_err(HarnessError::Http)?;

        self.check_response(response)?;
        Ok(())
    }

    /// Fetch the active or captured simulation
    pub fn get_simulation(&self) -> Result<Simulation> {
        let response = self
            .agent
            .get(&self.url("/simulation"))
            .call()
            .map_err(HarnessError::Http)?;

        let response = self.check_response(response)?;
        Ok(serde_json::from_str(&read_body(response)?)?)
    }

    /// Clear all simulation state
    pub fn delete_simulation(&self) -> Result<()> {
        let response = self
            .agent
            .delete(&self.url("/simulation"))
            .call()
            .map_err(HarnessError::Http)?;

        self.check_response(response)?;
        Ok(())
    }

    /// Fetch Hoverfly's log, oldest entry first
    pub fn logs(&self) -> Result<Vec<LogEntry>> {
        let response = self
            .agent
            .get(&self.url("/logs"))
            .call()
            .map_err(HarnessError::Http)?;

        let response = self.check_response(response)?;
        let logs: LogsResponse = serde_json::from_str(&read_body(response)?)?;
        Ok(logs.logs)
    }
}

/// Read a whole response body. Captures and logs grow with the traffic
/// seen, so ureq's default body limit does not apply.
fn read_body(mut response: ureq::http::Response<ureq::Body>) -> Result<String> {
    Ok(response
        .body_mut()
        .with_config()
        .limit(u64::MAX)
        .read_to_string()?)
}
