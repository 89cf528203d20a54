use crate::core::market::MarketDataClient;
use crate::core::model::MarketRef;
use crate::providers::util::with_retry;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Client for the automated-valuation HTTP API covering both property and
/// vehicle lookups. A response with a null value means the provider answered
/// but has no estimate for this reference.
pub struct HttpMarketDataClient {
    base_url: String,
}

impl HttpMarketDataClient {
    pub fn new(base_url: &str) -> Self {
        HttpMarketDataClient {
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarketValueResponse {
    value: Option<Decimal>,
}

#[async_trait]
impl MarketDataClient for HttpMarketDataClient {
    #[instrument(
        name = "MarketValueFetch",
        skip(self),
        fields(market_ref = %market_ref)
    )]
    async fn fetch_value(&self, market_ref: &MarketRef) -> Result<Option<Decimal>> {
        let client = reqwest::Client::builder()
            .user_agent("wealthsync/1.0")
            .build()?;

        let (url, query) = match market_ref {
            MarketRef::Property { address } => (
                format!("{}/v1/properties/value", self.base_url),
                Some(("address", address.as_str())),
            ),
            MarketRef::Vehicle { vehicle_code } => (
                format!("{}/v1/vehicles/{}/value", self.base_url, vehicle_code),
                None,
            ),
        };
        debug!("Requesting market estimate from {}", url);

        let response = with_retry(
            || async {
                let mut request = client.get(&url);
                if let Some(param) = query {
                    request = request.query(&[param]);
                }
                request.send().await
            },
            3,
            500,
        )
        .await
        .with_context(|| format!("Failed to send market request for {market_ref}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Market provider returned {} for {}",
                response.status(),
                market_ref
            ));
        }

        let payload: MarketValueResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse market response for {market_ref}"))?;

        debug!("Market estimate for {market_ref}: {:?}", payload.value);
        Ok(payload.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn home() -> MarketRef {
        MarketRef::Property {
            address: "12 High St".to_string(),
        }
    }

    #[tokio::test]
    async fn test_property_value_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/properties/value"))
            .and(query_param("address", "12 High St"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 452300.50}"#))
            .mount(&server)
            .await;

        let client = HttpMarketDataClient::new(&server.uri());
        let value = client.fetch_value(&home()).await.unwrap();
        assert_eq!(value, Some(Decimal::new(45230050, 2)));
    }

    #[tokio::test]
    async fn test_vehicle_value_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/vehicles/VH-2012-CIVIC/value"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 9400}"#))
            .mount(&server)
            .await;

        let client = HttpMarketDataClient::new(&server.uri());
        let car = MarketRef::Vehicle {
            vehicle_code: "VH-2012-CIVIC".to_string(),
        };
        let value = client.fetch_value(&car).await.unwrap();
        assert_eq!(value, Some(Decimal::from(9400)));
    }

    #[tokio::test]
    async fn test_null_value_means_no_estimate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/properties/value"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": null}"#))
            .mount(&server)
            .await;

        let client = HttpMarketDataClient::new(&server.uri());
        let value = client.fetch_value(&home()).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_server_error_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/properties/value"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpMarketDataClient::new(&server.uri());
        let err = client.fetch_value(&home()).await.unwrap_err();
        assert!(err.to_string().contains("Market provider returned 503"));
    }

    #[tokio::test]
    async fn test_malformed_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/properties/value"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = HttpMarketDataClient::new(&server.uri());
        let err = client.fetch_value(&home()).await.unwrap_err();
        assert!(
            err.to_string()
                .contains("Failed to parse market response for property at 12 High St")
        );
    }
}
