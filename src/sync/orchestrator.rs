//! Per-cycle sync orchestration: select, attempt, reconcile, notify

use crate::core::config::SyncSettings;
use crate::core::eligibility::EligibilityEvaluator;
use crate::core::feed::FeedClient;
use crate::core::market::MarketDataClient;
use crate::core::model::{Account, ItemId, MarketKind, SyncAttempt, SyncStatus};
use crate::core::notify::NotificationSink;
use crate::core::reconcile::{Reconciler, mark_checked};
use crate::store::{MarketItemQuery, RecordStore};
use crate::sync::CancelHandle;
use crate::sync::cursor::{BatchCursor, WalkStats};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// What one refresh cycle did. Per-account and per-batch failures are folded
/// into these counters instead of escaping as errors.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub accounts_selected: usize,
    pub accounts_succeeded: usize,
    pub accounts_failed: usize,
    /// Valuations updated from per-account feed attempts.
    pub items_updated: usize,
    pub property_walk: WalkStats,
    pub vehicle_walk: WalkStats,
    /// Store failures that were logged and skipped over.
    pub store_errors: usize,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        CycleReport {
            started_at,
            finished_at: started_at,
            accounts_selected: 0,
            accounts_succeeded: 0,
            accounts_failed: 0,
            items_updated: 0,
            property_walk: WalkStats::default(),
            vehicle_walk: WalkStats::default(),
            store_errors: 0,
        }
    }
}

/// Drives one refresh cycle end to end: selects the accounts that are due,
/// attempts each against the feed, reconciles returned valuations, walks the
/// market-fed items, and notifies per-account outcomes.
///
/// A cycle is a single cooperative sweep. `run_cycle` refuses to start while
/// another cycle holds the run guard; two concurrent sweeps would both judge
/// the same account eligible and double-attempt it.
pub struct SyncOrchestrator {
    store: Arc<dyn RecordStore>,
    feed: Arc<dyn FeedClient>,
    market: Arc<dyn MarketDataClient>,
    notifier: Arc<dyn NotificationSink>,
    settings: SyncSettings,
    cancel: CancelHandle,
    run_guard: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        feed: Arc<dyn FeedClient>,
        market: Arc<dyn MarketDataClient>,
        notifier: Arc<dyn NotificationSink>,
        settings: SyncSettings,
        cancel: CancelHandle,
    ) -> Self {
        SyncOrchestrator {
            store,
            feed,
            market,
            notifier,
            settings,
            cancel,
            run_guard: Mutex::new(()),
        }
    }

    /// Runs one full refresh cycle and reports what happened.
    ///
    /// Errors only when the cycle cannot start at all (another cycle is
    /// running, or the candidate query fails). Once accounts are selected,
    /// every failure is captured at the smallest unit, logged, and counted
    /// in the report; the cycle always runs to completion or cancellation.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _guard = self
            .run_guard
            .try_lock()
            .map_err(|_| anyhow!("a sync cycle is already running"))?;

        let started_at = Utc::now();
        let mut report = CycleReport::new(started_at);
        info!("Sync cycle starting");

        let due = self.select_due_accounts(started_at, &mut report).await?;
        report.accounts_selected = due.len();
        info!("Selected {} accounts for refresh", due.len());

        for account in due {
            if self.cancel.is_cancelled() {
                info!("Sync cycle cancelled; remaining accounts left for the next cycle");
                break;
            }
            self.attempt_account(account, &mut report).await;
        }

        match self.market_walk(MarketKind::Property).await {
            Ok(stats) => report.property_walk = stats,
            Err(e) => {
                report.store_errors += 1;
                error!(error = %e, "property revaluation walk aborted");
            }
        }
        match self.market_walk(MarketKind::Vehicle).await {
            Ok(stats) => report.vehicle_walk = stats,
            Err(e) => {
                report.store_errors += 1;
                error!(error = %e, "vehicle revaluation walk aborted");
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Sync cycle finished: {}/{} accounts succeeded, {} feed valuations updated, {} store errors",
            report.accounts_succeeded,
            report.accounts_selected,
            report.items_updated,
            report.store_errors
        );
        Ok(report)
    }

    /// Accounts due this cycle: the store prefilters on staleness and
    /// credential presence, the evaluator re-checks every rule against an
    /// attempt-log snapshot, and the result is capped per cycle.
    async fn select_due_accounts(
        &self,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<Vec<Account>> {
        let evaluator = EligibilityEvaluator::from_settings(&self.settings, now);
        let candidates = self
            .store
            .sync_candidates(now - self.settings.stale_after())
            .await?;
        debug!("Store returned {} sync candidates", candidates.len());

        let mut due = Vec::new();
        for account in candidates {
            if due.len() >= self.settings.max_accounts_per_cycle {
                break;
            }
            let attempts = match self
                .store
                .attempts_since(account.id, now - self.settings.failure_window())
                .await
            {
                Ok(attempts) => attempts,
                Err(e) => {
                    report.store_errors += 1;
                    error!(account = %account.id, error = %e, "could not load attempt log; skipping account");
                    continue;
                }
            };
            if evaluator.is_due(&account, &attempts, now) {
                due.push(account);
            }
        }
        Ok(due)
    }

    /// One account attempt against the feed. An attempt row is appended on
    /// both outcomes, since the failure circuit depends on a complete log;
    /// `last_synced_at` moves only on success, so failed accounts stay stale
    /// and retry until their circuit opens.
    async fn attempt_account(&self, mut account: Account, report: &mut CycleReport) {
        let attempt_started = Utc::now();
        debug!(account = %account.id, "attempting feed refresh");

        account.sync_status = SyncStatus::InProgress;
        if let Err(e) = self.store.put_account(&account).await {
            report.store_errors += 1;
            error!(account = %account.id, error = %e, "could not mark account in progress; skipping");
            return;
        }

        // Eligibility guarantees a credential on every selected account.
        let credential = account.feed_credential.clone().unwrap_or_default();
        let result = self.feed.fetch_latest_valuations(&credential).await;
        let finished = Utc::now();
        let duration_secs = (finished - attempt_started).num_seconds();

        let (succeeded, note, updated) = match result {
            Ok(valuations) => {
                let updated = self.apply_feed_valuations(&valuations, finished, report).await;
                report.items_updated += updated;
                (true, None, updated)
            }
            Err(e) => {
                warn!(account = %account.id, error = %e, "feed refresh failed");
                (false, Some(e.audit_note()), 0)
            }
        };

        let attempt = SyncAttempt {
            at: finished,
            succeeded,
            duration_secs,
            note,
        };
        if let Err(e) = self.store.append_attempt(account.id, attempt).await {
            report.store_errors += 1;
            error!(account = %account.id, error = %e, "could not append sync attempt");
        }

        if succeeded {
            account.sync_status = SyncStatus::Succeeded;
            account.last_synced_at = Some(finished);
            report.accounts_succeeded += 1;
        } else {
            account.sync_status = SyncStatus::Failed;
            report.accounts_failed += 1;
        }
        if let Err(e) = self.store.put_account(&account).await {
            report.store_errors += 1;
            error!(account = %account.id, error = %e, "could not update sync status");
        }

        // Fire and forget: delivery trouble never rolls back a sync outcome.
        if let Err(e) = self
            .notifier
            .notify_sync_result(&account, succeeded, updated)
            .await
        {
            warn!(account = %account.id, error = %e, "sync notification failed");
        }
    }

    /// Reconciles every valuation the feed returned and persists the results
    /// in bounded batches, one atomic write per chunk. A failed chunk loses
    /// only itself; returns the number of rows actually persisted.
    async fn apply_feed_valuations(
        &self,
        valuations: &HashMap<ItemId, Decimal>,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> usize {
        let reconciler = Reconciler::from_settings(&self.settings);

        let mut updated = Vec::new();
        for (&item_id, &value) in valuations {
            match self.store.item(item_id).await {
                Ok(Some(mut item)) => {
                    let outcome = reconciler.apply(&mut item, value, now);
                    debug!(item = %item.id, action = ?outcome.action, "reconciled feed valuation");
                    updated.push(item);
                }
                Ok(None) => {
                    warn!(item = %item_id, "feed returned a valuation for an unknown item");
                }
                Err(e) => {
                    report.store_errors += 1;
                    error!(item = %item_id, error = %e, "could not load item for reconciliation");
                }
            }
        }
        updated.sort_by_key(|item| item.id);

        let mut persisted = 0;
        for chunk in updated.chunks(self.settings.batch_size.max(1)) {
            match self.store.upsert_items(chunk).await {
                Ok(()) => persisted += chunk.len(),
                Err(e) => {
                    report.store_errors += 1;
                    error!(error = %e, "could not persist a batch of reconciled valuations");
                }
            }
        }
        persisted
    }

    /// Re-values market-fed items of one kind in ID-ordered batches. Per-item
    /// lookup failures stamp the checked timestamp and move on, so a down
    /// provider cannot pin the walk to the same rows every cycle.
    async fn market_walk(&self, kind: MarketKind) -> Result<WalkStats> {
        let checked_before = Utc::now() - self.settings.market_ignore_window();
        let query = MarketItemQuery::market(kind, checked_before);
        let cursor = BatchCursor::new(
            self.store.as_ref(),
            self.settings.batch_size,
            self.settings.progress_every_batches,
            self.cancel.clone(),
        );
        let reconciler = Reconciler::from_settings(&self.settings);

        let label = match kind {
            MarketKind::Property => "property revaluation",
            MarketKind::Vehicle => "vehicle revaluation",
        };
        let market = self.market.as_ref();
        let reconciler = &reconciler;

        cursor
            .walk(label, &query, move |mut batch| async move {
                for item in &mut batch {
                    let market_ref = match item.market_ref.clone() {
                        Some(market_ref) => market_ref,
                        // The query only selects items with a market reference.
                        None => continue,
                    };
                    let now = Utc::now();
                    match market.fetch_value(&market_ref).await {
                        Ok(Some(value)) => {
                            let outcome = reconciler.apply(item, value, now);
                            debug!(item = %item.id, action = ?outcome.action, "reconciled market valuation");
                        }
                        Ok(None) => {
                            mark_checked(
                                item,
                                &format!("no market estimate available for {market_ref}"),
                                now,
                            );
                        }
                        Err(e) => {
                            warn!(item = %item.id, error = %e, "market lookup failed");
                            mark_checked(item, &format!("market lookup failed: {e}"), now);
                        }
                    }
                }
                Ok(batch)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feed::FeedError;
    use crate::core::model::{AccountId, MarketRef, OwnerId, ValuationItem};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum FeedScript {
        Values(HashMap<ItemId, Decimal>),
        Transient(&'static str),
        Data(&'static str),
    }

    struct ScriptedFeed {
        script: FeedScript,
        calls: AtomicUsize,
    }

    impl ScriptedFeed {
        fn values(pairs: &[(i64, i64)]) -> Self {
            let map = pairs
                .iter()
                .map(|&(id, value)| (ItemId(id), Decimal::from(value)))
                .collect();
            ScriptedFeed {
                script: FeedScript::Values(map),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_transient(msg: &'static str) -> Self {
            ScriptedFeed {
                script: FeedScript::Transient(msg),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_data(msg: &'static str) -> Self {
            ScriptedFeed {
                script: FeedScript::Data(msg),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedClient for ScriptedFeed {
        async fn fetch_latest_valuations(
            &self,
            _credential: &str,
        ) -> Result<HashMap<ItemId, Decimal>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                FeedScript::Values(map) => Ok(map.clone()),
                FeedScript::Transient(msg) => Err(FeedError::Transient((*msg).to_string())),
                FeedScript::Data(msg) => Err(FeedError::Data((*msg).to_string())),
            }
        }
    }

    struct FixedMarket {
        value: Option<Decimal>,
        fail: bool,
    }

    impl FixedMarket {
        fn none() -> Arc<Self> {
            Arc::new(FixedMarket {
                value: None,
                fail: false,
            })
        }

        fn some(value: i64) -> Arc<Self> {
            Arc::new(FixedMarket {
                value: Some(Decimal::from(value)),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(FixedMarket {
                value: None,
                fail: true,
            })
        }
    }

    #[async_trait]
    impl MarketDataClient for FixedMarket {
        async fn fetch_value(&self, _market_ref: &MarketRef) -> Result<Option<Decimal>> {
            if self.fail {
                anyhow::bail!("market provider unavailable");
            }
            Ok(self.value)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: std::sync::Mutex<Vec<(AccountId, bool, usize)>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingNotifier {
        async fn notify_sync_result(
            &self,
            account: &Account,
            succeeded: bool,
            items_updated: usize,
        ) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((account.id, succeeded, items_updated));
            Ok(())
        }
    }

    fn stale_account(id: i64, now: DateTime<Utc>) -> Account {
        Account {
            id: AccountId(id),
            email: format!("user{id}@example.com"),
            last_synced_at: Some(now - Duration::hours(30)),
            last_login_at: now - Duration::days(3),
            sync_status: SyncStatus::Pending,
            feed_credential: Some(format!("cred-{id}")),
        }
    }

    fn bank_item(id: i64, current: i64, feed_observed: Option<i64>) -> ValuationItem {
        ValuationItem {
            id: ItemId(id),
            name: format!("Account {id}"),
            current_value: Decimal::from(current),
            feed_observed_value: feed_observed.map(Decimal::from),
            feed_updated_at: None,
            feed_checked_at: None,
            refresh_note: None,
            uses_feed: true,
            market_ref: None,
            owner_ids: vec![OwnerId(1)],
        }
    }

    fn market_item(id: i64, market_ref: MarketRef, current: i64) -> ValuationItem {
        ValuationItem {
            id: ItemId(id),
            name: format!("Asset {id}"),
            current_value: Decimal::from(current),
            feed_observed_value: None,
            feed_updated_at: None,
            feed_checked_at: None,
            refresh_note: None,
            uses_feed: true,
            market_ref: Some(market_ref),
            owner_ids: vec![OwnerId(1)],
        }
    }

    async fn seed_failures(store: &MemoryStore, id: AccountId, count: usize, now: DateTime<Utc>) {
        for i in 0..count {
            store
                .append_attempt(
                    id,
                    SyncAttempt {
                        at: now - Duration::minutes(((count - i) as i64) * 10),
                        succeeded: false,
                        duration_secs: 4,
                        note: Some("transient: timeout".to_string()),
                    },
                )
                .await
                .unwrap();
        }
    }

    fn orchestrator(
        store: Arc<MemoryStore>,
        feed: Arc<ScriptedFeed>,
        market: Arc<FixedMarket>,
        notifier: Arc<RecordingNotifier>,
        settings: SyncSettings,
    ) -> SyncOrchestrator {
        SyncOrchestrator::new(store, feed, market, notifier, settings, CancelHandle::new())
    }

    #[tokio::test]
    async fn test_cycle_refreshes_stale_account_end_to_end() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.put_account(&stale_account(1, now)).await.unwrap();
        seed_failures(&store, AccountId(1), 2, now).await;
        store
            .upsert_items(&[bank_item(10, 150, Some(100)), bank_item(11, 0, None)])
            .await
            .unwrap();

        let feed = Arc::new(ScriptedFeed::values(&[(10, 110), (11, 500)]));
        let notifier = Arc::new(RecordingNotifier::default());
        let orch = orchestrator(
            store.clone(),
            feed.clone(),
            FixedMarket::none(),
            notifier.clone(),
            SyncSettings::default(),
        );

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.accounts_selected, 1);
        assert_eq!(report.accounts_succeeded, 1);
        assert_eq!(report.accounts_failed, 0);
        assert_eq!(report.items_updated, 2);
        assert_eq!(report.store_errors, 0);

        let account = store.account(AccountId(1)).await.unwrap().unwrap();
        assert_eq!(account.sync_status, SyncStatus::Succeeded);
        assert!(account.last_synced_at.unwrap() >= report.started_at);

        let attempts = store
            .attempts_since(AccountId(1), now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(attempts.len(), 3);
        assert!(attempts.last().unwrap().succeeded);

        // Diverged value keeps its premium: 150 * 110/100 = 165.
        let scaled = store.item(ItemId(10)).await.unwrap().unwrap();
        assert_eq!(scaled.current_value, Decimal::from(165));
        assert_eq!(scaled.feed_observed_value, Some(Decimal::from(110)));
        // First-ever feed observation overwrites.
        let overwritten = store.item(ItemId(11)).await.unwrap().unwrap();
        assert_eq!(overwritten.current_value, Decimal::from(500));

        assert_eq!(
            *notifier.events.lock().unwrap(),
            vec![(AccountId(1), true, 2)]
        );
    }

    #[tokio::test]
    async fn test_fresh_account_is_not_attempted_again() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.put_account(&stale_account(1, now)).await.unwrap();

        let feed = Arc::new(ScriptedFeed::values(&[]));
        let orch = orchestrator(
            store.clone(),
            feed.clone(),
            FixedMarket::none(),
            Arc::new(RecordingNotifier::default()),
            SyncSettings::default(),
        );

        let first = orch.run_cycle().await.unwrap();
        assert_eq!(first.accounts_succeeded, 1);
        assert_eq!(feed.calls(), 1);

        // The account is fresh now, so the next cycle leaves it alone.
        let second = orch.run_cycle().await.unwrap();
        assert_eq!(second.accounts_selected, 0);
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test]
    async fn test_feed_failure_appends_attempt_and_keeps_account_stale() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let mut account = stale_account(1, now);
        account.last_synced_at = None;
        store.put_account(&account).await.unwrap();

        let feed = Arc::new(ScriptedFeed::failing_transient("connection reset by peer"));
        let notifier = Arc::new(RecordingNotifier::default());
        let orch = orchestrator(
            store.clone(),
            feed,
            FixedMarket::none(),
            notifier.clone(),
            SyncSettings::default(),
        );

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.accounts_failed, 1);
        assert_eq!(report.items_updated, 0);

        let account = store.account(AccountId(1)).await.unwrap().unwrap();
        assert_eq!(account.sync_status, SyncStatus::Failed);
        assert!(account.last_synced_at.is_none());

        let attempts = store
            .attempts_since(AccountId(1), now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(!attempts[0].succeeded);
        assert_eq!(
            attempts[0].note.as_deref(),
            Some("transient: connection reset by peer")
        );

        assert_eq!(
            *notifier.events.lock().unwrap(),
            vec![(AccountId(1), false, 0)]
        );
    }

    #[tokio::test]
    async fn test_data_failure_is_noted_distinctly() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.put_account(&stale_account(1, now)).await.unwrap();

        let feed = Arc::new(ScriptedFeed::failing_data("credential rejected"));
        let orch = orchestrator(
            store.clone(),
            feed,
            FixedMarket::none(),
            Arc::new(RecordingNotifier::default()),
            SyncSettings::default(),
        );
        orch.run_cycle().await.unwrap();

        let attempts = store
            .attempts_since(AccountId(1), now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(attempts[0].note.as_deref(), Some("data: credential rejected"));
    }

    #[tokio::test]
    async fn test_open_circuit_suppresses_attempts() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.put_account(&stale_account(1, now)).await.unwrap();
        seed_failures(&store, AccountId(1), 3, now).await;

        let feed = Arc::new(ScriptedFeed::values(&[]));
        let notifier = Arc::new(RecordingNotifier::default());
        let orch = orchestrator(
            store.clone(),
            feed.clone(),
            FixedMarket::none(),
            notifier.clone(),
            SyncSettings::default(),
        );

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.accounts_selected, 0);
        assert_eq!(feed.calls(), 0);
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_selection_is_capped_per_cycle() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        for id in 1..=3 {
            store.put_account(&stale_account(id, now)).await.unwrap();
        }

        let settings = SyncSettings {
            max_accounts_per_cycle: 2,
            ..Default::default()
        };
        let feed = Arc::new(ScriptedFeed::values(&[]));
        let orch = orchestrator(
            store.clone(),
            feed.clone(),
            FixedMarket::none(),
            Arc::new(RecordingNotifier::default()),
            settings,
        );

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.accounts_selected, 2);
        assert_eq!(report.accounts_succeeded, 2);
        assert_eq!(feed.calls(), 2);

        // The uncapped account was never touched.
        let third = store.account(AccountId(3)).await.unwrap().unwrap();
        assert_eq!(third.sync_status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn test_market_walks_revalue_property_and_vehicle() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_items(&[
                market_item(
                    1,
                    MarketRef::Property {
                        address: "12 High St".to_string(),
                    },
                    400_000,
                ),
                market_item(
                    2,
                    MarketRef::Vehicle {
                        vehicle_code: "VH-7".to_string(),
                    },
                    20_000,
                ),
            ])
            .await
            .unwrap();

        let orch = orchestrator(
            store.clone(),
            Arc::new(ScriptedFeed::values(&[])),
            FixedMarket::some(450_000),
            Arc::new(RecordingNotifier::default()),
            SyncSettings::default(),
        );

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.property_walk, WalkStats { batches: 1, items: 1 });
        assert_eq!(report.vehicle_walk, WalkStats { batches: 1, items: 1 });

        for id in [1, 2] {
            let item = store.item(ItemId(id)).await.unwrap().unwrap();
            assert_eq!(item.current_value, Decimal::from(450_000));
            assert!(item.feed_checked_at.is_some());
        }

        // Freshly checked items are ignored by the next cycle's walks.
        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.property_walk, WalkStats::default());
        assert_eq!(report.vehicle_walk, WalkStats::default());
    }

    #[tokio::test]
    async fn test_missing_market_estimate_stamps_without_touching_value() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_items(&[market_item(
                1,
                MarketRef::Property {
                    address: "12 High St".to_string(),
                },
                400_000,
            )])
            .await
            .unwrap();

        let orch = orchestrator(
            store.clone(),
            Arc::new(ScriptedFeed::values(&[])),
            FixedMarket::none(),
            Arc::new(RecordingNotifier::default()),
            SyncSettings::default(),
        );
        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.property_walk.items, 1);

        let item = store.item(ItemId(1)).await.unwrap().unwrap();
        assert_eq!(item.current_value, Decimal::from(400_000));
        assert!(item.feed_checked_at.is_some());
        assert!(item.feed_updated_at.is_none());
        assert!(
            item.refresh_note
                .as_deref()
                .unwrap()
                .contains("no market estimate")
        );
    }

    #[tokio::test]
    async fn test_market_lookup_failure_stamps_and_walk_continues() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_items(&[
                market_item(
                    1,
                    MarketRef::Vehicle {
                        vehicle_code: "VH-1".to_string(),
                    },
                    9_000,
                ),
                market_item(
                    2,
                    MarketRef::Vehicle {
                        vehicle_code: "VH-2".to_string(),
                    },
                    7_500,
                ),
            ])
            .await
            .unwrap();

        let orch = orchestrator(
            store.clone(),
            Arc::new(ScriptedFeed::values(&[])),
            FixedMarket::failing(),
            Arc::new(RecordingNotifier::default()),
            SyncSettings::default(),
        );
        let report = orch.run_cycle().await.unwrap();

        // Both rows were visited, stamped, and left at their old values.
        assert_eq!(report.vehicle_walk.items, 2);
        assert_eq!(report.store_errors, 0);
        for (id, value) in [(1, 9_000), (2, 7_500)] {
            let item = store.item(ItemId(id)).await.unwrap().unwrap();
            assert_eq!(item.current_value, Decimal::from(value));
            assert!(
                item.refresh_note
                    .as_deref()
                    .unwrap()
                    .contains("market lookup failed")
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_feed_item_is_skipped() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.put_account(&stale_account(1, now)).await.unwrap();

        let feed = Arc::new(ScriptedFeed::values(&[(99, 500)]));
        let notifier = Arc::new(RecordingNotifier::default());
        let orch = orchestrator(
            store.clone(),
            feed,
            FixedMarket::none(),
            notifier.clone(),
            SyncSettings::default(),
        );

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.accounts_succeeded, 1);
        assert_eq!(report.items_updated, 0);
        assert_eq!(
            *notifier.events.lock().unwrap(),
            vec![(AccountId(1), true, 0)]
        );
    }

    #[tokio::test]
    async fn test_concurrent_cycle_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(
            store,
            Arc::new(ScriptedFeed::values(&[])),
            FixedMarket::none(),
            Arc::new(RecordingNotifier::default()),
            SyncSettings::default(),
        );

        let _guard = orch.run_guard.try_lock().unwrap();
        let err = orch.run_cycle().await.unwrap_err();
        assert!(err.to_string().contains("already running"));
    }

    #[tokio::test]
    async fn test_cancelled_cycle_attempts_nothing() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.put_account(&stale_account(1, now)).await.unwrap();

        let feed = Arc::new(ScriptedFeed::values(&[]));
        let cancel = CancelHandle::new();
        cancel.cancel();
        let orch = SyncOrchestrator::new(
            store.clone(),
            feed.clone(),
            FixedMarket::none(),
            Arc::new(RecordingNotifier::default()),
            SyncSettings::default(),
            cancel,
        );

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.accounts_selected, 1);
        assert_eq!(report.accounts_succeeded + report.accounts_failed, 0);
        assert_eq!(feed.calls(), 0);
    }
}
