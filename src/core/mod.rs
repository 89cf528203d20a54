//! Core business logic abstractions

pub mod circuit;
pub mod config;
pub mod eligibility;
pub mod feed;
pub mod log;
pub mod market;
pub mod model;
pub mod notify;
pub mod reconcile;

// Re-export main types for cleaner imports
pub use circuit::{CircuitState, FailureCircuit};
pub use eligibility::EligibilityEvaluator;
pub use feed::{FeedClient, FeedError};
pub use market::MarketDataClient;
pub use model::{
    Account, AccountId, ItemId, MarketKind, MarketRef, OwnerId, SyncAttempt, SyncStatus,
    ValuationItem,
};
pub use notify::NotificationSink;
pub use reconcile::{ReconcileAction, ReconcileOutcome, Reconciler};
