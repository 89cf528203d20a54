//! Bounded, ID-ordered batch walks over the record store

use crate::core::model::ValuationItem;
use crate::store::{MarketItemQuery, RecordStore};
use crate::sync::CancelHandle;
use anyhow::Result;
use std::future::Future;
use tracing::info;

/// Running totals for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub batches: usize,
    pub items: usize,
}

/// Walks a large record set in fixed-size windows without ever loading the
/// whole table. Each window is re-queried after the previous commit, so rows
/// the handler stamped drop out of the predicate and the walk advances
/// without a processed-marker.
pub struct BatchCursor<'a> {
    store: &'a dyn RecordStore,
    batch_size: usize,
    progress_every: usize,
    cancel: CancelHandle,
}

impl<'a> BatchCursor<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        batch_size: usize,
        progress_every: usize,
        cancel: CancelHandle,
    ) -> Self {
        BatchCursor {
            store,
            batch_size,
            progress_every: progress_every.max(1),
            cancel,
        }
    }

    /// Repeatedly pages rows matching `query`, hands each page to `handler`,
    /// and commits the rows it returns as one atomic batch.
    ///
    /// The handler must return every row of the page with its checked
    /// timestamp stamped; that is what stops the next page query from
    /// re-selecting them. Terminates on the first empty page or when
    /// cancelled; handler and store errors surface to the caller, which owns
    /// the decision to continue.
    pub async fn walk<F, Fut>(
        &self,
        label: &str,
        query: &MarketItemQuery,
        mut handler: F,
    ) -> Result<WalkStats>
    where
        F: FnMut(Vec<ValuationItem>) -> Fut,
        Fut: Future<Output = Result<Vec<ValuationItem>>>,
    {
        let approx = self.store.count_market_items(query).await?;
        info!("{label}: starting batch walk over ~{approx} items");

        let mut stats = WalkStats::default();
        loop {
            if self.cancel.is_cancelled() {
                info!("{label}: walk cancelled after {} batches", stats.batches);
                break;
            }

            let page = self.store.market_items_page(query, self.batch_size).await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            let processed = handler(page).await?;
            self.store.upsert_items(&processed).await?;

            stats.batches += 1;
            stats.items += page_len;
            if stats.batches % self.progress_every == 0 {
                info!(
                    "{label}: processed {} batches ({} items so far)",
                    stats.batches, stats.items
                );
            }
        }

        info!(
            "{label}: batch walk finished, {} items in {} batches",
            stats.items, stats.batches
        );
        Ok(stats)
    }
}
