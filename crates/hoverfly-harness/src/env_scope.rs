//! Process-wide proxy environment for the duration of a session
//!
//! Client code under test is never told about Hoverfly. It picks the proxy
//! and CA bundle up from the standard environment variables, so they are
//! set for the whole process while a [`ProxyEnvironment`] is alive. Only one
//! may be alive at a time.

use std::ffi::OsString;
use std::path::Path;

use crate::error::{HarnessError, Result};

pub const HTTP_PROXY_VAR: &str = "HTTP_PROXY";
pub const HTTPS_PROXY_VAR: &str = "HTTPS_PROXY";
/// Honoured by OpenSSL, rustls-native-certs and aiohttp
pub const SSL_CERT_FILE_VAR: &str = "SSL_CERT_FILE";
/// Honoured by python-requests
pub const REQUESTS_CA_BUNDLE_VAR: &str = "REQUESTS_CA_BUNDLE";

/// Every variable a [`ProxyEnvironment`] manages
pub const MANAGED_VARS: [&str; 4] = [
    HTTP_PROXY_VAR,
    HTTPS_PROXY_VAR,
    SSL_CERT_FILE_VAR,
    REQUESTS_CA_BUNDLE_VAR,
];

/// Guard that points outbound HTTP(S) at Hoverfly until dropped
#[derive(Debug)]
#[must_use = "the proxy environment is restored as soon as the guard is dropped"]
pub struct ProxyEnvironment {
    previous: Vec<(&'static str, Option<OsString>)>,
}

impl ProxyEnvironment {
    /// Set the proxy and CA variables, failing before touching anything if
    /// `cert` does not exist
    pub fn enter(proxy_url: &str, cert: &Path) -> Result<Self> {
        if !cert.exists() {
            return Err(HarnessError::CertNotFound(cert.to_path_buf()));
        }

        let previous = MANAGED_VARS
            .iter()
            .map(|name| (*name, std::env::var_os(name)))
            .collect();

        std::env::set_var(HTTP_PROXY_VAR, proxy_url);
        std::env::set_var(HTTPS_PROXY_VAR, proxy_url);
        std::env::set_var(SSL_CERT_FILE_VAR, cert);
        std::env::set_var(REQUESTS_CA_BUNDLE_VAR, cert);

        tracing::debug!(proxy = proxy_url, cert = %cert.display(), "proxy environment set");

        Ok(Self { previous })
    }
}

impl Drop for ProxyEnvironment {
    fn drop(&mut self) {
        for (name, value) in self.previous.drain(..) {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
        tracing::debug!("proxy environment restored");
    }
}
