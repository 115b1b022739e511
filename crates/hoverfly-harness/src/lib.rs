//! Record and replay HTTP traffic in tests through Hoverfly
//!
//! [Hoverfly](https://hoverfly.io) is an HTTP(S) proxy that can capture
//! real traffic into a simulation file and later serve responses from it.
//! This crate drives a Hoverfly instance through its admin API so tests can
//! run against recorded fixtures instead of the network.
//!
//! # Usage
//!
//! ```no_run
//! use hoverfly_harness::{Directive, Harness, HarnessConfig};
//!
//! let config = HarnessConfig::load(None)?.with_simulation_path("tests/simulations");
//! let harness = Harness::start(config)?;
//!
//! harness.run(&Directive::replay("archive_org_simulation"), || {
//!     // HTTP_PROXY/HTTPS_PROXY point at Hoverfly here
//! })?;
//! # Ok::<(), hoverfly_harness::HarnessError>(())
//! ```
//!
//! # Instances
//!
//! If `HOVERFLY_HOST`, `HOVERFLY_ADMIN_PORT` and `HOVERFLY_PROXY_PORT` are
//! all set, that instance is used and never stopped. Otherwise a container
//! is started from `spectolabs/hoverfly` and killed when the [`Harness`] is
//! dropped.
//!
//! # Recording
//!
//! `Directive::record(name)` proxies real traffic and writes
//! `<simulation_path>/<name>.json` at the end of the run, with credentials
//! scrubbed (see [`ScrubRules`]). Use [`Directive::stateful`] for services
//! that answer the same request differently over time.

pub mod admin;
pub mod config;
pub mod container;
pub mod directive;
pub mod env_scope;
pub mod error;
mod harness;
pub mod instance;
pub mod poll;
pub mod session;
pub mod simulation;


pub use admin::{AdminClient, CaptureArguments, LogEntry, Mode};
pub use config::HarnessConfig;
pub use container::{ContainerRuntime, ContainerSpec, DockerCli, ManagedContainer};
pub use directive::{Directive, SessionStrategy};
pub use env_scope::ProxyEnvironment;
pub use error::{HarnessError, ReadinessPhase, Result};
pub use harness::{ActiveSession, Harness, TestResult};
pub use instance::Instance;
pub use session::{Outcome, RecordSession, ReplaySession, Session};
pub use simulation::{ScrubRules, Simulation};
