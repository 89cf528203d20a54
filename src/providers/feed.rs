use crate::core::feed::{FeedClient, FeedError};
use crate::core::model::ItemId;
use crate::providers::util::with_retry;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Client for the aggregation feed's HTTP API. One call returns the latest
/// known valuation for every item linked to a credential.
pub struct HttpFeedClient {
    base_url: String,
}

impl HttpFeedClient {
    pub fn new(base_url: &str) -> Self {
        HttpFeedClient {
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedValuationsResponse {
    status: Option<String>,
    #[serde(default)]
    valuations: Vec<FeedValuation>,
}

#[derive(Debug, Deserialize)]
struct FeedValuation {
    item_id: i64,
    value: Decimal,
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_latest_valuations(
        &self,
        credential: &str,
    ) -> Result<HashMap<ItemId, Decimal>, FeedError> {
        if credential.is_empty() {
            return Err(FeedError::Data("empty feed credential".to_string()));
        }

        let url = format!("{}/v1/credentials/{}/valuations", self.base_url, credential);
        debug!("Requesting feed valuations from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("wealthsync/1.0")
            .build()
            .map_err(|e| FeedError::Transient(format!("could not build http client: {e}")))?;

        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .map_err(|e| FeedError::Transient(format!("feed request failed: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FeedError::Transient(format!("feed returned {status}")));
        }
        if !status.is_success() {
            return Err(FeedError::Data(format!(
                "feed rejected the credential: {status}"
            )));
        }

        let payload: FeedValuationsResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Data(format!("malformed feed response: {e}")))?;

        if let Some(reported) = payload.status.as_deref() {
            if !reported.eq_ignore_ascii_case("ok") {
                return Err(FeedError::Data(format!(
                    "feed reported status '{reported}'"
                )));
            }
        }

        debug!("Feed returned {} valuations", payload.valuations.len());
        Ok(payload
            .valuations
            .into_iter()
            .map(|valuation| (ItemId(valuation.item_id), valuation.value))
            .collect())
    }
}
