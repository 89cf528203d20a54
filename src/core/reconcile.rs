//! Valuation reconciliation between feed observations and user edits

use crate::core::config::SyncSettings;
use crate::core::model::ValuationItem;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Which branch of the reconciliation fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// The feed value replaced the current value directly.
    Overwrite,
    /// The current value was scaled by the feed movement, preserving the
    /// user's relative adjustment.
    Scale,
    /// The current value was left untouched.
    Skip,
}

impl std::fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ReconcileAction::Overwrite => "overwritten",
            ReconcileAction::Scale => "scaled",
            ReconcileAction::Skip => "unchanged",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub action: ReconcileAction,
    pub new_current_value: Decimal,
    pub new_feed_observed_value: Decimal,
    /// Human-readable audit text naming the branch and before/after values.
    pub note: String,
}

/// Merges a new feed observation into a possibly user-overridden valuation.
///
/// A manual override is not a stored flag: the item is considered overridden
/// when its current value has materially diverged from the last feed
/// observation, i.e. by more than `tolerance` currency units.
#[derive(Debug, Clone)]
pub struct Reconciler {
    tolerance: Decimal,
    scale_with_feed: bool,
}

impl Reconciler {
    pub fn new(tolerance: Decimal, scale_with_feed: bool) -> Self {
        Reconciler {
            tolerance,
            scale_with_feed,
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(settings.valuation_tolerance, settings.scale_with_feed)
    }

    /// Decides how `new_feed_value` merges into the item, without mutating it.
    ///
    /// First-ever observations and values within tolerance of the last feed
    /// observation overwrite; a diverged value is scaled by the feed movement
    /// and rounded to whole units, unless scaling is disabled. Every outcome
    /// records the new feed observation.
    pub fn reconcile(&self, item: &ValuationItem, new_feed_value: Decimal) -> ReconcileOutcome {
        let old_feed = item.feed_observed_value.unwrap_or(Decimal::ZERO);
        let old_user = item.current_value;

        if old_feed.is_zero() {
            return ReconcileOutcome {
                action: ReconcileAction::Overwrite,
                new_current_value: new_feed_value,
                new_feed_observed_value: new_feed_value,
                note: format!("feed value {new_feed_value} applied (no prior feed observation)"),
            };
        }

        if (old_feed - old_user).abs() <= self.tolerance {
            return ReconcileOutcome {
                action: ReconcileAction::Overwrite,
                new_current_value: new_feed_value,
                new_feed_observed_value: new_feed_value,
                note: format!(
                    "feed value {new_feed_value} applied over {old_user} (within tolerance of last feed {old_feed})"
                ),
            };
        }

        if !self.scale_with_feed {
            return ReconcileOutcome {
                action: ReconcileAction::Skip,
                new_current_value: old_user,
                new_feed_observed_value: new_feed_value,
                note: format!(
                    "feed moved {old_feed} -> {new_feed_value} but scaling is disabled; kept {old_user}"
                ),
            };
        }

        // old_feed is non-zero here; checked math keeps the division
        // panic-free even if that invariant is ever broken.
        match new_feed_value
            .checked_div(old_feed)
            .and_then(|ratio| old_user.checked_mul(ratio))
        {
            Some(raw) => {
                let scaled = raw.round();
                ReconcileOutcome {
                    action: ReconcileAction::Scale,
                    new_current_value: scaled,
                    new_feed_observed_value: new_feed_value,
                    note: format!(
                        "scaled {old_user} -> {scaled} following feed movement {old_feed} -> {new_feed_value}"
                    ),
                }
            }
            None => ReconcileOutcome {
                action: ReconcileAction::Skip,
                new_current_value: old_user,
                new_feed_observed_value: new_feed_value,
                note: format!(
                    "could not derive scale ratio from feed movement {old_feed} -> {new_feed_value}; kept {old_user}"
                ),
            },
        }
    }

    /// Reconciles and writes the outcome back into the item, stamping the
    /// feed-updated and feed-checked timestamps.
    pub fn apply(
        &self,
        item: &mut ValuationItem,
        new_feed_value: Decimal,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let outcome = self.reconcile(item, new_feed_value);
        item.current_value = outcome.new_current_value;
        item.feed_observed_value = Some(outcome.new_feed_observed_value);
        item.feed_updated_at = Some(now);
        item.feed_checked_at = Some(now);
        item.refresh_note = Some(outcome.note.clone());
        outcome
    }
}

/// Records a feed lookup that produced no value. Only the checked timestamp
/// and audit note move; the valuation itself is untouched. Stamping the
/// timestamp is what keeps a stuck item from being retried every cycle while
/// the feed is down.
pub fn mark_checked(item: &mut ValuationItem, note: &str, now: DateTime<Utc>) {
    item.feed_checked_at = Some(now);
    item.refresh_note = Some(note.to_string());
}
