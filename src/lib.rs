pub mod cli;
pub mod core;
pub mod providers;
pub mod store;
pub mod sync;

use crate::core::config::AppConfig;
use crate::core::model::ItemId;
use crate::providers::{HttpFeedClient, HttpMarketDataClient, LogNotifier};
use crate::store::{FjallStore, RecordStore};
use crate::sync::{CancelHandle, SyncOrchestrator};
use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Commands the binary dispatches to after argument parsing.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Run one sync cycle against the configured providers.
    Run,
    /// Show per-account sync state from the local store.
    Status,
    /// Apply a single feed observation to one valuation item.
    Reconcile { item: i64, value: Decimal },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Wealth sync starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store: Arc<dyn RecordStore> = Arc::new(FjallStore::open(config.store_dir()?)?);

    match command {
        AppCommand::Run => {
            let feed_base_url = config
                .providers
                .feed
                .as_ref()
                .map_or("https://feed.example.com", |p| &p.base_url);
            let market_base_url = config
                .providers
                .market
                .as_ref()
                .map_or("https://market.example.com", |p| &p.base_url);

            let orchestrator = SyncOrchestrator::new(
                Arc::clone(&store),
                Arc::new(HttpFeedClient::new(feed_base_url)),
                Arc::new(HttpMarketDataClient::new(market_base_url)),
                Arc::new(LogNotifier::new()),
                config.sync.clone(),
                CancelHandle::new(),
            );
            cli::run::run(&orchestrator).await
        }
        AppCommand::Status => cli::status::run(store.as_ref(), &config.sync).await,
        AppCommand::Reconcile { item, value } => {
            cli::reconcile::run(store.as_ref(), &config.sync, ItemId(item), value).await
        }
    }
}
