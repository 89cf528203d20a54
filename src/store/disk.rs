use crate::core::model::{
    Account, AccountId, ItemId, OwnerId, SyncAttempt, ValuationItem,
};
use crate::store::{MarketItemQuery, RecordStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use tracing::debug;

// Sign bit flipped so the big-endian byte order matches numeric order.
fn id_key(raw: i64) -> [u8; 8] {
    ((raw as u64) ^ (1 << 63)).to_be_bytes()
}

// Account prefix plus microsecond timestamp keeps a per-account attempt log
// that scans oldest-first.
fn attempt_key(id: AccountId, at: DateTime<Utc>) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&id_key(id.0));
    key[8..].copy_from_slice(&id_key(at.timestamp_micros()));
    key
}

/// Record store persisted in a local fjall keyspace, one partition per
/// record type. Values are JSON; keys are big-endian IDs so range scans come
/// back in ID order.
pub struct FjallStore {
    keyspace: Keyspace,
    accounts: PartitionHandle,
    attempts: PartitionHandle,
    items: PartitionHandle,
}

impl FjallStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let keyspace = fjall::Config::new(path.as_ref()).open().with_context(|| {
            format!("Failed to open record store at {}", path.as_ref().display())
        })?;
        let accounts = keyspace.open_partition("accounts", PartitionCreateOptions::default())?;
        let attempts = keyspace.open_partition("attempts", PartitionCreateOptions::default())?;
        let items = keyspace.open_partition("items", PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            accounts,
            attempts,
            items,
        })
    }

    fn matching_items(
        &self,
        query: &MarketItemQuery,
        limit: Option<usize>,
    ) -> Result<Vec<ValuationItem>> {
        let iter: Box<dyn Iterator<Item = fjall::Result<fjall::KvPair>>> = match query.id_from {
            Some(from) => Box::new(self.items.range(id_key(from.0).to_vec()..)),
            None => Box::new(self.items.iter()),
        };

        let mut matched = Vec::new();
        for entry in iter {
            let (_, value) = entry?;
            let item: ValuationItem = serde_json::from_slice(&value)?;
            if query.matches(&item) {
                matched.push(item);
                if limit.is_some_and(|l| matched.len() >= l) {
                    break;
                }
            }
        }
        Ok(matched)
    }
}

#[async_trait]
impl RecordStore for FjallStore {
    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        match self.accounts.get(id_key(id.0))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_account(&self, account: &Account) -> Result<()> {
        debug!("Store PUT for account: {}", account.id);
        self.accounts
            .insert(id_key(account.id.0), serde_json::to_vec(account)?)?;
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();
        for entry in self.accounts.iter() {
            let (_, value) = entry?;
            accounts.push(serde_json::from_slice(&value)?);
        }
        Ok(accounts)
    }

    async fn sync_candidates(&self, stale_cutoff: DateTime<Utc>) -> Result<Vec<Account>> {
        let mut candidates = Vec::new();
        for entry in self.accounts.iter() {
            let (_, value) = entry?;
            let account: Account = serde_json::from_slice(&value)?;
            if account.has_feed_credential()
                && account
                    .last_synced_at
                    .is_none_or(|synced| synced < stale_cutoff)
            {
                candidates.push(account);
            }
        }
        Ok(candidates)
    }

    async fn append_attempt(&self, id: AccountId, attempt: SyncAttempt) -> Result<()> {
        debug!("Store APPEND attempt for account: {id}");
        self.attempts
            .insert(attempt_key(id, attempt.at), serde_json::to_vec(&attempt)?)?;
        Ok(())
    }

    async fn attempts_since(
        &self,
        id: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SyncAttempt>> {
        let mut attempts = Vec::new();
        for entry in self.attempts.prefix(id_key(id.0)) {
            let (_, value) = entry?;
            let attempt: SyncAttempt = serde_json::from_slice(&value)?;
            if attempt.at >= since {
                attempts.push(attempt);
            }
        }
        Ok(attempts)
    }

    async fn item(&self, id: ItemId) -> Result<Option<ValuationItem>> {
        match self.items.get(id_key(id.0))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn items_for_owner(&self, owner: OwnerId) -> Result<Vec<ValuationItem>> {
        let mut items = Vec::new();
        for entry in self.items.iter() {
            let (_, value) = entry?;
            let item: ValuationItem = serde_json::from_slice(&value)?;
            if item.owner_ids.contains(&owner) {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn market_items_page(
        &self,
        query: &MarketItemQuery,
        limit: usize,
    ) -> Result<Vec<ValuationItem>> {
        self.matching_items(query, Some(limit))
    }

    async fn count_market_items(&self, query: &MarketItemQuery) -> Result<usize> {
        Ok(self.matching_items(query, None)?.len())
    }

    async fn upsert_items(&self, items: &[ValuationItem]) -> Result<()> {
        debug!("Store UPSERT of {} items", items.len());
        let mut batch = self.keyspace.batch();
        for item in items {
            batch.insert(&self.items, id_key(item.id.0), serde_json::to_vec(item)?);
        }
        batch.commit()?;
        Ok(())
    }
}
