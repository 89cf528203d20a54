use crate::core::model::Account;
use crate::core::notify::NotificationSink;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

/// Notification sink that writes sync outcomes to the operational log.
/// Real delivery (email, push) belongs to an external system; this sink is
/// what ships with the engine and what operators tail in practice.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        LogNotifier
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify_sync_result(
        &self,
        account: &Account,
        succeeded: bool,
        items_updated: usize,
    ) -> Result<()> {
        if succeeded {
            info!(
                account = %account.id,
                email = %account.email,
                items_updated,
                "sync succeeded"
            );
        } else {
            warn!(
                account = %account.id,
                email = %account.email,
                "sync failed"
            );
        }
        Ok(())
    }
}
