//! Exponential backoff polling used by the readiness waits

use std::time::{Duration, Instant};

/// Delay before the second evaluation of a predicate
pub const INITIAL_DELAY: Duration = Duration::from_millis(1);

/// Why a poll ended without the predicate becoming true
#[derive(Debug)]
pub enum PollError<E> {
    /// The timeout elapsed
    TimedOut,
    /// The predicate failed in a way that retrying will not fix
    Aborted(E),
}

/// Deadline and current delay of one polling run
#[derive(Debug)]
pub struct PollState {
    started: Instant,
    timeout: Duration,
    delay: Duration,
}

impl PollState {
    pub fn new(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            delay: INITIAL_DELAY,
        }
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.timeout
    }

    /// Delay the next [`PollState::backoff`] will sleep for
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep for the current delay, then double it
    pub fn backoff(&mut self) {
        std::thread::sleep(self.delay);
        self.delay = self.delay.saturating_mul(2);
    }
}

/// Evaluate `predicate` until it returns `Ok(true)` or `timeout` elapses.
///
/// Every `Ok(false)` is followed by a sleep that doubles each time,
/// starting at [`INITIAL_DELAY`]. An `Err` from the predicate ends the poll
/// immediately.
pub fn poll_until<F, E>(mut predicate: F, timeout: Duration) -> Result<(), PollError<E>>
where
    F: FnMut() -> Result<bool, E>,
{
    let mut state = PollState::new(timeout);

    while !state.expired() {
        if predicate().map_err(PollError::Aborted)? {
            return Ok(());
        }
        state.backoff();
    }

    Err(PollError::TimedOut)
}
