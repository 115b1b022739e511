//! Simulation fixtures and the scrub rules applied to recordings
//!
//! Only the parts of the Hoverfly simulation schema we touch are typed.
//! Everything else is kept as raw JSON so a fixture written by us loads
//! back into Hoverfly unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Headers removed from every recorded request
pub const SCRUBBED_HEADERS: [&str; 4] = [
    "Authorization",
    "User-Agent",
    "X-Goog-Api-Client",
    "Private-Token",
];

/// Destination of the Google OAuth token exchange
pub const TOKEN_EXCHANGE_DESTINATION: &str = "oauth2.googleapis.com";
/// Path of the Google OAuth token exchange
pub const TOKEN_EXCHANGE_PATH: &str = "/token";

/// A Hoverfly simulation: `{"data": {"pairs": [...]}, "meta": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub data: SimulationData,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationData {
    #[serde(default)]
    pub pairs: Vec<RequestResponsePair>,
    /// `globalActions` and anything else Hoverfly puts next to the pairs
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A recorded request matcher and the response served for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResponsePair {
    pub request: Map<String, Value>,
    pub response: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestResponsePair {
    /// Value of the first matcher for a request field such as `destination`
    pub fn request_matcher_value(&self, field: &str) -> Option<&str> {
        self.request
            .get(field)?
            .as_array()?
            .first()?
            .get("value")?
            .as_str()
    }

    pub fn has_request_header(&self, name: &str) -> bool {
        self.request
            .get("headers")
            .and_then(Value::as_object)
            .is_some_and(|headers| headers.contains_key(name))
    }

    /// Remove a request header, returning whether it was present
    pub fn remove_request_header(&mut self, name: &str) -> bool {
        self.request
            .get_mut("headers")
            .and_then(Value::as_object_mut)
            .and_then(|headers| headers.remove(name))
            .is_some()
    }

    pub fn response_body(&self) -> Option<&str> {
        self.response.get("body").and_then(Value::as_str)
    }
}

impl Simulation {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Write with two-space indentation
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Conditional scrub of a credential exchange request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialExchange {
    pub destination: String,
    pub path: String,
}

/// Sensitive or noisy data removed from a recording before it is saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubRules {
    /// Request headers deleted from every pair
    pub headers: Vec<String>,
    /// Pair whose request body and `Content-Length` are deleted
    pub credential_exchange: Option<CredentialExchange>,
}

impl Default for ScrubRules {
    fn default() -> Self {
        Self {
            headers: SCRUBBED_HEADERS.iter().map(|h| h.to_string()).collect(),
            credential_exchange: Some(CredentialExchange {
                destination: TOKEN_EXCHANGE_DESTINATION.to_string(),
                path: TOKEN_EXCHANGE_PATH.to_string(),
            }),
        }
    }
}

impl ScrubRules {
    /// No scrubbing at all
    pub fn none() -> Self {
        Self {
            headers: Vec::new(),
            credential_exchange: None,
        }
    }

    /// Scrub every pair, returning how many were touched
    pub fn apply(&self, simulation: &mut Simulation) -> usize {
        simulation
            .data
            .pairs
            .iter_mut()
            .map(|pair| self.apply_to_pair(pair))
            .filter(|changed| *changed)
            .count()
    }

    fn apply_to_pair(&self, pair: &mut RequestResponsePair) -> bool {
        let mut changed = false;

        for header in &self.headers {
            changed |= pair.remove_request_header(header);
        }

        if let Some(exchange) = &self.credential_exchange {
            let matches = pair.request_matcher_value("destination") == Some(exchange.destination.as_str())
                && pair.request_matcher_value("path") == Some(exchange.path.as_str());

            if matches {
                changed |= pair.request.remove("body").is_some();
                changed |= pair.remove_request_header("Content-Length");
            }
        }

        changed
    }
}

/// File name for a fixture identifier: verbatim if it already names a
/// `.json` file, otherwise with `.json` appended
pub fn fixture_file_name(name: &str) -> String {
    if name.contains(".json") {
        name.to_string()
    } else {
        format!("{}.json", name)
    }
}
