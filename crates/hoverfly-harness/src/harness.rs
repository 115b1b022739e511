use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use crate::admin::AdminClient;
use crate::config::HarnessConfig;
use crate::container::{ContainerRuntime, ContainerSpec, DockerCli, ManagedContainer};
use crate::directive::{Directive, SessionStrategy};
use crate::env_scope::ProxyEnvironment;
use crate::error::Result;
use crate::instance::Instance;
use crate::session::{Outcome, RecordSession, ReplaySession, Session};

/// Whether a test body's return value means the test failed
pub trait TestResult {
    fn is_failure(&self) -> bool;
}

impl TestResult for () {
    fn is_failure(&self) -> bool {
        false
    }
}

impl<T, E> TestResult for std::result::Result<T, E> {
    fn is_failure(&self) -> bool {
        self.is_err()
    }
}

/// A Hoverfly instance plus the configuration sessions run with.
///
/// Create one per test process. External instances (see
/// [`Instance::try_from_env`]) are used as is; otherwise a container is
/// started and destroyed when the harness is dropped.
pub struct Harness {
    config: HarnessConfig,
    instance: Instance,
    client: AdminClient,
    container: Option<ManagedContainer>,
}

impl Harness {
    /// Locate or start an instance using the `docker` CLI
    pub fn start(config: HarnessConfig) -> Result<Self> {
        Self::start_with_runtime(config, Box::new(DockerCli::new()))
    }

    pub fn start_with_runtime(
        config: HarnessConfig,
        runtime: Box<dyn ContainerRuntime>,
    ) -> Result<Self> {
        if let Some(instance) = Instance::try_from_process_env()? {
            tracing::info!(
                admin = %instance.admin_endpoint(),
                "using externally managed Hoverfly"
            );
            return Ok(Self::connect(config, instance));
        }

        let spec = ContainerSpec::new(config.image.clone()).with_command(config.container_command()?);
        let container = ManagedContainer::acquire(runtime, &spec, config.start_timeout()?)?;
        let instance = container.instance().clone();

        Ok(Self {
            client: AdminClient::new(&instance),
            instance,
            config,
            container: Some(container),
        })
    }

    /// Use an already running instance. Nothing is torn down on drop.
    pub fn connect(config: HarnessConfig, instance: Instance) -> Self {
        Self {
            client: AdminClient::new(&instance),
            instance,
            config,
            container: None,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn admin(&self) -> &AdminClient {
        &self.client
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// True when the instance is a container owned by this harness
    pub fn is_managed(&self) -> bool {
        self.container.is_some()
    }

    pub fn fixture_path(&self, directive: &Directive) -> Result<PathBuf> {
        Ok(self.config.simulation_dir()?.join(directive.file_name()))
    }

    /// Point the process at Hoverfly and start the directive's session.
    ///
    /// Configuration problems are reported before Hoverfly is contacted.
    pub fn open(&self, directive: &Directive) -> Result<ActiveSession<'_>> {
        let fixture_path = self.fixture_path(directive)?;
        let env = ProxyEnvironment::enter(&self.instance.proxy_url(), &self.config.cert_path())?;

        let session = match directive.strategy() {
            SessionStrategy::Replay => {
                Session::Replay(ReplaySession::start(&self.client, &fixture_path)?)
            }
            SessionStrategy::Record { stateful } => {
                Session::Record(RecordSession::start(&self.client, &fixture_path, stateful)?)
            }
        };

        Ok(ActiveSession { session, _env: env })
    }

    /// Run a test body inside a session.
    ///
    /// A panic or an `Err` from `body` counts as a failed call. Cleanup runs
    /// either way, then a panic is resumed.
    pub fn run<F, R>(&self, directive: &Directive, body: F) -> Result<R>
    where
        F: FnOnce() -> R,
        R: TestResult,
    {
        let active = self.open(directive)?;

        let result = panic::catch_unwind(AssertUnwindSafe(body));
        let call_failed = match &result {
            Ok(value) => value.is_failure(),
            Err(_) => true,
        };

        active.on_outcome(Outcome {
            setup_passed: true,
            call_failed,
        });
        let finished = active.finish();

        match result {
            Ok(value) => {
                finished?;
                Ok(value)
            }
            Err(payload) => {
                if let Err(e) = finished {
                    tracing::warn!(error = %e, "session cleanup failed after test panic");
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

/// A running session with the proxy environment set.
///
/// Dropping it clears Hoverfly's simulation, then restores the environment.
pub struct ActiveSession<'a> {
    session: Session<'a>,
    _env: ProxyEnvironment,
}

impl ActiveSession<'_> {
    pub fn on_outcome(&self, outcome: Outcome) {
        self.session.on_outcome(outcome);
    }

    /// Finish the session (saving a recording) and restore the environment
    pub fn finish(self) -> Result<()> {
        let ActiveSession { session, _env } = self;
        session.finish()
    }
}
