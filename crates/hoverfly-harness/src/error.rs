use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Which readiness wait ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessPhase {
    /// Waiting for the container runtime to publish the requested ports
    PortExposure,
    /// Waiting for the admin API to answer a probe
    AdminApi,
}

impl fmt::Display for ReadinessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessPhase::PortExposure => write!(f, "container port exposure"),
            ReadinessPhase::AdminApi => write!(f, "Hoverfly admin API"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(
        "Simulation directory not found: {}. Set simulation_path in hoverfly.toml or HOVERFLY_HARNESS_SIMULATION_PATH",
        .0.display()
    )]
    MissingSimulationDir(PathBuf),

    #[error(
        "Cert file not found: {}. Hoverfly's default CA is linked from https://hoverfly.readthedocs.io/en/latest/pages/tutorials/basic/https/https.html",
        .0.display()
    )]
    CertNotFound(PathBuf),

    #[error("Unknown arguments passed to hoverfly directive: {0}")]
    UnknownDirectiveArgument(String),

    #[error("Invalid hoverfly directive: {0}")]
    InvalidDirective(String),

    #[error("Invalid environment variable {name}: {message}")]
    InvalidEnv { name: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out after {timeout:?} waiting for {phase}")]
    Timeout {
        phase: ReadinessPhase,
        timeout: Duration,
    },

    #[error("Hoverfly API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container error: {0}")]
    Container(String),
}

impl HarnessError {
    /// True for errors raised before any network or container activity
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            HarnessError::MissingSimulationDir(_)
                | HarnessError::CertNotFound(_)
                | HarnessError::UnknownDirectiveArgument(_)
                | HarnessError::InvalidDirective(_)
                | HarnessError::InvalidEnv { .. }
                | HarnessError::Config(_)
        )
    }
}

impl From<figment::Error> for HarnessError {
    fn from(err: figment::Error) -> Self {
        HarnessError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
