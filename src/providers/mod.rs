pub mod feed;
pub mod market;
pub mod notifier;
pub mod util;

// Re-export the shipped collaborator implementations
pub use feed::HttpFeedClient;
pub use market::HttpMarketDataClient;
pub use notifier::LogNotifier;
