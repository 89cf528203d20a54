//! External data-feed contract

use crate::core::model::ItemId;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

/// Why a feed fetch failed. Both kinds count against the failure circuit;
/// the split only changes the audit note on the attempt, so operators can
/// tell a systemic outage from a per-account data problem.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network trouble, timeouts, or a remote 5xx. Worth retrying next cycle.
    #[error("transient feed failure: {0}")]
    Transient(String),

    /// The account's data is bad: rejected credential, malformed payload.
    #[error("feed data error: {0}")]
    Data(String),
}

impl FeedError {
    /// Short audit text recorded on the failed attempt.
    pub fn audit_note(&self) -> String {
        match self {
            FeedError::Transient(msg) => format!("transient: {msg}"),
            FeedError::Data(msg) => format!("data: {msg}"),
        }
    }
}

/// Client for the external financial-data feed. Fetches the latest known
/// valuations for every item linked to one feed credential.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_latest_valuations(
        &self,
        credential: &str,
    ) -> Result<HashMap<ItemId, Decimal>, FeedError>;
}
