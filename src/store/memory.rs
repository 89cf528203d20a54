use crate::core::model::{
    Account, AccountId, ItemId, OwnerId, SyncAttempt, ValuationItem,
};
use crate::store::{MarketItemQuery, RecordStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Records {
    accounts: BTreeMap<AccountId, Account>,
    attempts: BTreeMap<AccountId, Vec<SyncAttempt>>,
    items: BTreeMap<ItemId, ValuationItem>,
}

/// In-memory record store. BTreeMaps keep reads in ID order for free; one
/// lock around all three maps makes every call, including `upsert_items`,
/// atomic. Used by tests and as a lightweight backend.
pub struct MemoryStore {
    inner: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Records::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        let records = self.inner.lock().await;
        Ok(records.accounts.get(&id).cloned())
    }

    async fn put_account(&self, account: &Account) -> Result<()> {
        let mut records = self.inner.lock().await;
        debug!("Store PUT for account: {}", account.id);
        records.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let records = self.inner.lock().await;
        Ok(records.accounts.values().cloned().collect())
    }

    async fn sync_candidates(&self, stale_cutoff: DateTime<Utc>) -> Result<Vec<Account>> {
        let records = self.inner.lock().await;
        Ok(records
            .accounts
            .values()
            .filter(|a| {
                a.has_feed_credential()
                    && a.last_synced_at.is_none_or(|synced| synced < stale_cutoff)
            })
            .cloned()
            .collect())
    }

    async fn append_attempt(&self, id: AccountId, attempt: SyncAttempt) -> Result<()> {
        let mut records = self.inner.lock().await;
        debug!("Store APPEND attempt for account: {id}");
        records.attempts.entry(id).or_default().push(attempt);
        Ok(())
    }

    async fn attempts_since(
        &self,
        id: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SyncAttempt>> {
        let records = self.inner.lock().await;
        Ok(records
            .attempts
            .get(&id)
            .map(|log| {
                log.iter()
                    .filter(|a| a.at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn item(&self, id: ItemId) -> Result<Option<ValuationItem>> {
        let records = self.inner.lock().await;
        Ok(records.items.get(&id).cloned())
    }

    async fn items_for_owner(&self, owner: OwnerId) -> Result<Vec<ValuationItem>> {
        let records = self.inner.lock().await;
        Ok(records
            .items
            .values()
            .filter(|i| i.owner_ids.contains(&owner))
            .cloned()
            .collect())
    }

    async fn market_items_page(
        &self,
        query: &MarketItemQuery,
        limit: usize,
    ) -> Result<Vec<ValuationItem>> {
        let records = self.inner.lock().await;
        Ok(records
            .items
            .values()
            .filter(|i| query.matches(i))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_market_items(&self, query: &MarketItemQuery) -> Result<usize> {
        let records = self.inner.lock().await;
        Ok(records.items.values().filter(|i| query.matches(i)).count())
    }

    async fn upsert_items(&self, items: &[ValuationItem]) -> Result<()> {
        let mut records = self.inner.lock().await;
        debug!("Store UPSERT of {} items", items.len());
        for item in items {
            records.items.insert(item.id, item.clone());
        }
        Ok(())
    }
}
