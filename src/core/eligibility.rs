//! Refresh eligibility decisions

use crate::core::circuit::FailureCircuit;
use crate::core::config::SyncSettings;
use crate::core::model::{Account, SyncAttempt};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Decides whether an account is due for a feed refresh. Pure function of
/// the account, its attempt log snapshot, and the clock; safe to call
/// repeatedly and in any order across accounts.
#[derive(Debug, Clone)]
pub struct EligibilityEvaluator {
    stale_after: Duration,
    min_login_since: DateTime<Utc>,
    circuit: FailureCircuit,
}

impl EligibilityEvaluator {
    pub fn new(stale_after: Duration, min_login_since: DateTime<Utc>, circuit: FailureCircuit) -> Self {
        EligibilityEvaluator {
            stale_after,
            min_login_since,
            circuit,
        }
    }

    /// Builds an evaluator for one cycle, anchoring the dormancy cutoff at `now`.
    pub fn from_settings(settings: &SyncSettings, now: DateTime<Utc>) -> Self {
        Self::new(
            settings.stale_after(),
            now - settings.min_login_window(),
            FailureCircuit::new(settings.max_consecutive_failures, settings.failure_window()),
        )
    }

    /// True when the account should be refreshed this cycle.
    ///
    /// An account is not due when it is still fresh, its owner is dormant,
    /// it has no feed credential, or its failure circuit is open.
    pub fn is_due(&self, account: &Account, attempts: &[SyncAttempt], now: DateTime<Utc>) -> bool {
        if let Some(last_synced) = account.last_synced_at {
            if now - last_synced < self.stale_after {
                debug!(account = %account.id, "skipping: synced recently");
                return false;
            }
        }

        if account.last_login_at < self.min_login_since {
            debug!(account = %account.id, "skipping: dormant account");
            return false;
        }

        if !account.has_feed_credential() {
            debug!(account = %account.id, "skipping: no feed credential");
            return false;
        }

        if self.circuit.is_open(attempts, now) {
            debug!(account = %account.id, "skipping: failure circuit open");
            return false;
        }

        true
    }
}
