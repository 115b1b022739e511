use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::container::IMAGE;
use crate::error::{HarnessError, Result};

/// Config file looked up in the current directory
pub const CONFIG_FILE_NAME: &str = "hoverfly.toml";
/// Prefix of environment variables overriding the config file
pub const ENV_PREFIX: &str = "HOVERFLY_HARNESS_";

/// Harness configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Directory with simulation files. Environment variables are expanded.
    pub simulation_path: Option<PathBuf>,
    /// Hoverfly image for managed containers
    pub image: String,
    /// Hoverfly's CA certificate, so clients trust its TLS interception
    pub cert: PathBuf,
    /// Seconds to wait for each readiness phase of a managed container
    pub start_timeout: f64,
    /// Arguments for the hoverfly command, passed as is
    pub args: Option<String>,
    /// Directory relative paths resolve against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            simulation_path: None,
            image: IMAGE.to_string(),
            cert: PathBuf::from("cert.pem"),
            start_timeout: 3.0,
            args: None,
            base_dir: None,
        }
    }
}

impl HarnessConfig {
    /// Layer defaults, a TOML file and `HOVERFLY_HARNESS_*` variables.
    ///
    /// An explicit `config_path` must exist; otherwise `hoverfly.toml` in
    /// the current directory is used when present.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(HarnessConfig::default()));

        let file = match config_path {
            Some(path) if !path.exists() => {
                return Err(HarnessError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path),
            None => std::env::current_dir()
                .ok()
                .map(|dir| dir.join(CONFIG_FILE_NAME))
                .filter(|path| path.exists()),
        };

        if let Some(path) = &file {
            tracing::debug!(path = %path.display(), "loading harness config");
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let mut config: HarnessConfig = figment.extract()?;
        config.base_dir = file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .filter(|dir| !dir.as_os_str().is_empty());

        Ok(config)
    }

    pub fn merge_with_cli(
        &mut self,
        simulation_path: Option<PathBuf>,
        image: Option<String>,
        cert: Option<PathBuf>,
        start_timeout: Option<f64>,
        args: Option<String>,
    ) {
        // Command line paths are relative to where the command runs, not to
        // the config file
        if let Some(path) = simulation_path {
            self.simulation_path = Some(from_cwd(path));
        }
        if let Some(image) = image {
            self.image = image;
        }
        if let Some(cert) = cert {
            self.cert = from_cwd(cert);
        }
        if let Some(timeout) = start_timeout {
            self.start_timeout = timeout;
        }
        if let Some(args) = args {
            self.args = Some(args);
        }
    }

    pub fn with_simulation_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.simulation_path = Some(path.into());
        self
    }

    pub fn with_cert(mut self, cert: impl Into<PathBuf>) -> Self {
        self.cert = cert.into();
        self
    }

    /// Expand variables and resolve against `base_dir` (or the current
    /// directory)
    fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = PathBuf::from(expand_vars(&path.to_string_lossy()));
        if expanded.is_absolute() {
            return expanded;
        }

        match &self.base_dir {
            Some(base) => base.join(expanded),
            None => std::env::current_dir()
                .map(|dir| dir.join(&expanded))
                .unwrap_or(expanded),
        }
    }

    /// Simulation directory, which must exist
    pub fn simulation_dir(&self) -> Result<PathBuf> {
        let path = self
            .simulation_path
            .as_deref()
            .map(|p| self.resolve(p))
            .unwrap_or_default();

        if path.as_os_str().is_empty() || !path.is_dir() {
            return Err(HarnessError::MissingSimulationDir(path));
        }

        Ok(path)
    }

    pub fn cert_path(&self) -> PathBuf {
        self.resolve(&self.cert)
    }

    pub fn start_timeout(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.start_timeout).map_err(|_| {
            HarnessError::Config(format!(
                "start_timeout must be a non-negative number of seconds, got {}",
                self.start_timeout
            ))
        })
    }

    /// Container command override from `args`
    pub fn container_command(&self) -> Result<Vec<String>> {
        match self.args.as_deref() {
            Some(args) => shell_words::split(args)
                .map_err(|e| HarnessError::Config(format!("Invalid hoverfly args: {}", e))),
            None => Ok(Vec::new()),
        }
    }
}

fn from_cwd(path: PathBuf) -> PathBuf {
    if path.is_absolute() || path.to_string_lossy().starts_with('$') {
        return path;
    }
    std::env::current_dir()
        .map(|dir| dir.join(&path))
        .unwrap_or(path)
}

/// Expand `$VAR` and `${VAR}`. Unset variables are left as written.
pub fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match std::env::var(name) {
            Ok(value) if !name.is_empty() => out.push_str(&value),
            _ => out.push_str(&rest[start..start + 1 + consumed]),
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}
