//! Record and replay sessions against the admin API
//!
//! A session is opened before the test body runs and finished after it.
//! Both kinds delete Hoverfly's simulation when they end, even when they
//! are dropped without [`finish`](ReplaySession::finish) being called, so
//! state never leaks into the next test.

use std::fs;
use std::path::{Path, PathBuf};

use crate::admin::{AdminClient, CaptureArguments, Mode};
use crate::error::Result;
use crate::simulation::{ScrubRules, Simulation};

/// How the test phases went, reported by the test runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub setup_passed: bool,
    pub call_failed: bool,
}

impl Outcome {
    pub fn passed() -> Self {
        Self {
            setup_passed: true,
            call_failed: false,
        }
    }

    pub fn call_failed() -> Self {
        Self {
            setup_passed: true,
            call_failed: true,
        }
    }
}

/// Serves a fixture file for the duration of one test
pub struct ReplaySession<'a> {
    client: &'a AdminClient,
    fixture_path: PathBuf,
    finished: bool,
}

impl<'a> ReplaySession<'a> {
    /// Upload the fixture verbatim and switch to simulate mode
    pub fn start(client: &'a AdminClient, fixture_path: &Path) -> Result<Self> {
        let data = fs::read_to_string(fixture_path)?;
        tracing::info!(fixture = %fixture_path.display(), "replaying simulation");

        // From here on the simulation must be cleared again
        let session = Self {
            client,
            fixture_path: fixture_path.to_path_buf(),
            finished: false,
        };

        client.put_simulation(&data)?;
        client.set_mode(Mode::Simulate, None)?;

        Ok(session)
    }

    pub fn fixture_path(&self) -> &Path {
        &self.fixture_path
    }

    /// When the test body failed, print Hoverfly's last logged error.
    ///
    /// Usually that error (e.g. no matching request) is why the test failed.
    /// Fetching logs is best effort and never raises.
    pub fn on_outcome(&self, outcome: Outcome) -> Option<String> {
        if !(outcome.setup_passed && outcome.call_failed) {
            return None;
        }

        match self.client.logs() {
            Ok(logs) => {
                let error = logs.last().and_then(|entry| entry.error.clone())?;
                eprintln!("----------------------------");
                eprintln!("Hoverfly's log has an error!");
                eprintln!("{}", error);
                Some(error)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch Hoverfly logs");
                None
            }
        }
    }

    /// Clear the simulation
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.client.delete_simulation()
    }
}

impl Drop for ReplaySession<'_> {
    fn drop(&mut self) {
        if !self.finished {
            clear_best_effort(self.client);
        }
    }
}

/// Captures real traffic into a fixture file for the duration of one test
///
/// Two recordings into the same path overwrite each other.
pub struct RecordSession<'a> {
    client: &'a AdminClient,
    fixture_path: PathBuf,
    rules: ScrubRules,
    finished: bool,
}

impl<'a> RecordSession<'a> {
    /// Switch to capture mode, keeping every request header
    pub fn start(client: &'a AdminClient, fixture_path: &Path, stateful: bool) -> Result<Self> {
        tracing::info!(fixture = %fixture_path.display(), stateful, "recording simulation");

        let session = Self {
            client,
            fixture_path: fixture_path.to_path_buf(),
            rules: ScrubRules::default(),
            finished: false,
        };

        client.set_mode(Mode::Capture, Some(&CaptureArguments::all_headers(stateful)))?;

        Ok(session)
    }

    /// Replace the default scrub rules
    pub fn with_rules(mut self, rules: ScrubRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn fixture_path(&self) -> &Path {
        &self.fixture_path
    }

    /// Fetch what was captured, scrub it, write it out and clear Hoverfly.
    ///
    /// The simulation is cleared even when saving fails; the first error
    /// wins.
    pub fn finish(mut self) -> Result<Simulation> {
        self.finished = true;

        let saved = self.save();
        let cleared = self.client.delete_simulation();

        let simulation = saved?;
        cleared?;
        Ok(simulation)
    }

    fn save(&self) -> Result<Simulation> {
        let mut simulation = self.client.get_simulation()?;
        let scrubbed = self.rules.apply(&mut simulation);
        simulation.save(&self.fixture_path)?;

        tracing::info!(
            fixture = %self.fixture_path.display(),
            pairs = simulation.data.pairs.len(),
            scrubbed,
            "saved simulation"
        );
        Ok(simulation)
    }
}

impl Drop for RecordSession<'_> {
    fn drop(&mut self) {
        if !self.finished {
            clear_best_effort(self.client);
        }
    }
}

fn clear_best_effort(client: &AdminClient) {
    if let Err(e) = client.delete_simulation() {
        tracing::warn!(error = %e, "failed to clear Hoverfly simulation");
    }
}

/// Either kind of session, chosen from a directive's strategy
pub enum Session<'a> {
    Replay(ReplaySession<'a>),
    Record(RecordSession<'a>),
}

impl Session<'_> {
    pub fn on_outcome(&self, outcome: Outcome) {
        if let Session::Replay(session) = self {
            session.on_outcome(outcome);
        }
    }

    pub fn finish(self) -> Result<()> {
        match self {
            Session::Replay(session) => session.finish(),
            Session::Record(session) => session.finish().map(|_| ()),
        }
    }
}
