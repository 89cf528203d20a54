//! Record types for synced accounts and tracked valuations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Stable identity of a synced account. IDs are monotonic and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

/// Stable identity of a valuation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub i64);

/// Identity of an owning profile. Ownership is many-to-many and only used
/// for read filtering, never for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub i64);

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SyncStatus::Pending => "pending",
                SyncStatus::InProgress => "in progress",
                SyncStatus::Succeeded => "succeeded",
                SyncStatus::Failed => "failed",
            }
        )
    }
}

/// An account linked to an external data feed.
///
/// `sync_status` and `last_synced_at` are written only by the orchestrator;
/// `last_synced_at` is stamped only after a successful attempt, so a failed
/// account stays stale and keeps retrying until its circuit opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_login_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    /// Feed-side identity. None or empty means the account has nothing to refresh.
    pub feed_credential: Option<String>,
}

impl Account {
    pub fn has_feed_credential(&self) -> bool {
        self.feed_credential.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// One refresh attempt against the external feed. Append-only, kept for audit;
/// circuit decisions only ever look at a rolling window of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAttempt {
    pub at: DateTime<Utc>,
    pub succeeded: bool,
    pub duration_secs: i64,
    /// Audit text, e.g. "transient: connection refused". Never drives control flow.
    pub note: Option<String>,
}

/// What kind of market lookup an item supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketKind {
    Property,
    Vehicle,
}

impl Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MarketKind::Property => "property",
                MarketKind::Vehicle => "vehicle",
            }
        )
    }
}

/// Key handed to the market-data provider for automated re-valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketRef {
    Property { address: String },
    Vehicle { vehicle_code: String },
}

impl MarketRef {
    pub fn kind(&self) -> MarketKind {
        match self {
            MarketRef::Property { .. } => MarketKind::Property,
            MarketRef::Vehicle { .. } => MarketKind::Vehicle,
        }
    }
}

impl Display for MarketRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketRef::Property { address } => write!(f, "property at {address}"),
            MarketRef::Vehicle { vehicle_code } => write!(f, "vehicle {vehicle_code}"),
        }
    }
}

/// A tracked asset or liability whose value may be fed automatically or set
/// by hand. Whether a manual override exists is not a stored flag; the
/// reconciler derives it by comparing `current_value` against
/// `feed_observed_value` within tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationItem {
    pub id: ItemId,
    pub name: String,
    pub current_value: Decimal,
    /// Last value observed from a feed. None means never fed.
    pub feed_observed_value: Option<Decimal>,
    /// When a feed value was last reconciled into this item.
    pub feed_updated_at: Option<DateTime<Utc>>,
    /// When a feed lookup was last attempted, successful or not. The batch
    /// walk predicate keys off this, so stamping it is what stops a row from
    /// being re-selected within the ignore window.
    pub feed_checked_at: Option<DateTime<Utc>>,
    /// Audit text describing the last refresh outcome, for support diagnostics.
    pub refresh_note: Option<String>,
    /// Whether automated feed updates are enabled for this item.
    pub uses_feed: bool,
    pub market_ref: Option<MarketRef>,
    pub owner_ids: Vec<OwnerId>,
}
