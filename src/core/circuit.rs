//! Failure circuit breaker over the per-account attempt log

use crate::core::model::SyncAttempt;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Attempts allowed.
    Closed,
    /// Attempts suppressed until a success lands or the window ages out.
    Open,
}

/// Per-account breaker derived from the rolling attempt log. Purely a
/// function of its inputs: it holds no state of its own and never errors.
#[derive(Debug, Clone)]
pub struct FailureCircuit {
    max_consecutive_failures: usize,
    window: Duration,
}

impl FailureCircuit {
    pub fn new(max_consecutive_failures: usize, window: Duration) -> Self {
        FailureCircuit {
            max_consecutive_failures,
            window,
        }
    }

    /// Derives the breaker state from attempts within the rolling window.
    ///
    /// The circuit opens once the window holds `max_consecutive_failures`
    /// attempts and none of the most recent `max_consecutive_failures` of
    /// them succeeded. A success anywhere in that slice keeps it closed, and
    /// attempts older than the window never count. An empty log is Closed:
    /// never attempted means eligible.
    pub fn state(&self, attempts: &[SyncAttempt], now: DateTime<Utc>) -> CircuitState {
        let cutoff = now - self.window;
        let mut recent: Vec<&SyncAttempt> = attempts.iter().filter(|a| a.at > cutoff).collect();

        if recent.len() < self.max_consecutive_failures {
            return CircuitState::Closed;
        }

        recent.sort_by(|a, b| b.at.cmp(&a.at));
        if recent
            .iter()
            .take(self.max_consecutive_failures)
            .any(|a| a.succeeded)
        {
            CircuitState::Closed
        } else {
            CircuitState::Open
        }
    }

    pub fn is_open(&self, attempts: &[SyncAttempt], now: DateTime<Utc>) -> bool {
        self.state(attempts, now) == CircuitState::Open
    }
}
