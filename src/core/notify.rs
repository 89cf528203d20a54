//! Notification contract for sync outcomes

use crate::core::model::Account;
use anyhow::Result;
use async_trait::async_trait;

/// Receives the outcome of a sync attempt. Fire-and-forget from the
/// orchestrator's perspective: delivery failure never rolls back a sync.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_sync_result(
        &self,
        account: &Account,
        succeeded: bool,
        items_updated: usize,
    ) -> Result<()>;
}
