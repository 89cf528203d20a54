use anyhow::{Context, Result};
use chrono::Duration;
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub feed: Option<FeedProviderConfig>,
    pub market: Option<MarketProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            feed: Some(FeedProviderConfig {
                base_url: "https://feed.example.com".to_string(),
            }),
            market: Some(MarketProviderConfig {
                base_url: "https://market.example.com".to_string(),
            }),
        }
    }
}

/// Thresholds driving eligibility, the failure circuit, reconciliation, and
/// the batch walks. Every field has a default so a minimal config works.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SyncSettings {
    /// Failures in the rolling window before the circuit opens.
    pub max_consecutive_failures: usize,
    /// An account is due for refresh once its last sync is older than this.
    pub stale_after_hours: i64,
    /// Accounts whose owner has not logged in for this long are skipped.
    pub min_login_days: i64,
    /// Rows per batch in the market-data walks and per persisted chunk.
    pub batch_size: usize,
    /// Feed and current value counting as "almost equal", in currency units.
    pub valuation_tolerance: Decimal,
    /// Cap on accounts attempted in one cycle.
    pub max_accounts_per_cycle: usize,
    /// Rolling window consulted by the failure circuit.
    pub failure_window_hours: i64,
    /// Items checked within this window are skipped by the market walks.
    pub market_ignore_hours: i64,
    /// Emit a walk progress log every this many batches.
    pub progress_every_batches: usize,
    /// When false, diverged valuations are left untouched instead of scaled.
    pub scale_with_feed: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            max_consecutive_failures: 3,
            stale_after_hours: 24,
            min_login_days: 730,
            batch_size: 10,
            valuation_tolerance: Decimal::TEN,
            max_accounts_per_cycle: 50,
            failure_window_hours: 24,
            market_ignore_hours: 24,
            progress_every_batches: 10,
            scale_with_feed: true,
        }
    }
}

impl SyncSettings {
    pub fn stale_after(&self) -> Duration {
        Duration::hours(self.stale_after_hours)
    }

    pub fn min_login_window(&self) -> Duration {
        Duration::days(self.min_login_days)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::hours(self.failure_window_hours)
    }

    pub fn market_ignore_window(&self) -> Duration {
        Duration::hours(self.market_ignore_hours)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    pub store_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "wealthsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Directory holding the local record store.
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.store_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "codito", "wealthsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("records"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
