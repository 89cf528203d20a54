//! Market-data provider contract for property and vehicle re-valuation

use crate::core::model::MarketRef;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Looks up an automated market estimate for a property or vehicle.
///
/// `Ok(None)` means the provider answered but has no estimate for this
/// reference; `Err` means the lookup itself failed. Both leave the stored
/// valuation untouched.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    async fn fetch_value(&self, market_ref: &MarketRef) -> Result<Option<Decimal>>;
}
