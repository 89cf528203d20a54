//! Persistence abstraction for accounts, attempt logs, and valuations

pub mod disk;
pub mod memory;

use crate::core::model::{
    Account, AccountId, ItemId, MarketKind, OwnerId, SyncAttempt, ValuationItem,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use disk::FjallStore;
pub use memory::MemoryStore;

/// Filter for the market-data batch walks: feed-enabled items carrying a
/// market reference that have not been checked since the cutoff. The optional
/// ID range allows manual partitioned runs over a slice of the table.
#[derive(Debug, Clone)]
pub struct MarketItemQuery {
    pub kind: Option<MarketKind>,
    /// Rows checked at or after this instant no longer match. Committing a
    /// batch therefore removes it from the next page query, which is what
    /// drives the walk forward.
    pub checked_before: DateTime<Utc>,
    pub id_from: Option<ItemId>,
    pub id_to: Option<ItemId>,
}

impl MarketItemQuery {
    pub fn market(kind: MarketKind, checked_before: DateTime<Utc>) -> Self {
        MarketItemQuery {
            kind: Some(kind),
            checked_before,
            id_from: None,
            id_to: None,
        }
    }

    pub fn matches(&self, item: &ValuationItem) -> bool {
        if !item.uses_feed {
            return false;
        }
        let market_ref = match &item.market_ref {
            Some(market_ref) => market_ref,
            None => return false,
        };
        if let Some(kind) = self.kind {
            if market_ref.kind() != kind {
                return false;
            }
        }
        if let Some(from) = self.id_from {
            if item.id < from {
                return false;
            }
        }
        if let Some(to) = self.id_to {
            if item.id > to {
                return false;
            }
        }
        match item.feed_checked_at {
            Some(checked) => checked < self.checked_before,
            None => true,
        }
    }
}

/// Abstract record store. Everything the engine persists goes through this
/// trait; adapters decide the storage technology. Implementations must keep
/// ID ordering on range reads and make `upsert_items` atomic per call.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn account(&self, id: AccountId) -> Result<Option<Account>>;

    async fn put_account(&self, account: &Account) -> Result<()>;

    /// All accounts in ID order.
    async fn accounts(&self) -> Result<Vec<Account>>;

    /// Cheap prefilter for the orchestrator: accounts holding a feed
    /// credential whose last sync is unset or older than `stale_cutoff`, in
    /// ID order. The eligibility evaluator re-checks every rule afterwards.
    async fn sync_candidates(&self, stale_cutoff: DateTime<Utc>) -> Result<Vec<Account>>;

    /// Appends one attempt to the account's log.
    async fn append_attempt(&self, id: AccountId, attempt: SyncAttempt) -> Result<()>;

    /// Consistent snapshot of the account's attempts at or after `since`,
    /// oldest first.
    async fn attempts_since(&self, id: AccountId, since: DateTime<Utc>)
    -> Result<Vec<SyncAttempt>>;

    async fn item(&self, id: ItemId) -> Result<Option<ValuationItem>>;

    /// Valuation items owned by the given profile, in ID order.
    async fn items_for_owner(&self, owner: OwnerId) -> Result<Vec<ValuationItem>>;

    /// One ID-ordered window of at most `limit` rows matching the query.
    async fn market_items_page(
        &self,
        query: &MarketItemQuery,
        limit: usize,
    ) -> Result<Vec<ValuationItem>>;

    /// Approximate matching-row count, used for walk progress logs only.
    async fn count_market_items(&self, query: &MarketItemQuery) -> Result<usize>;

    /// Writes the batch in one atomic transaction scoped to these rows.
    async fn upsert_items(&self, items: &[ValuationItem]) -> Result<()>;
}
