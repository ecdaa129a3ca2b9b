use super::util::{endpoint_url, fetch_body, http_client, positive_amount};
use crate::core::config::HttpProviderConfig;
use crate::core::{ProviderFailure, ProviderOutcome, QuoteProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const API_KEY_HEADER: &str = "X-API-Key";

/// Provider speaking `POST /rate` with `{"from","to","value"}` and answering
/// `{"rate": <converted amount>}`.
pub struct JsonApiProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl JsonApiProvider {
    pub fn new(config: &HttpProviderConfig) -> Result<Self> {
        Ok(JsonApiProvider {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            client: http_client()
                .with_context(|| format!("Failed to build HTTP client for {}", config.name))?,
        })
    }

    async fn fetch(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        cancel: &CancellationToken,
    ) -> Result<Decimal, ProviderFailure> {
        let url = endpoint_url(&self.base_url, "rate");
        debug!("Requesting conversion from {}", url);

        let body = RateRequest {
            from: from.to_uppercase(),
            to: to.to_uppercase(),
            value: amount,
        };
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let text = fetch_body(request, cancel).await?;
        let data: RateResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderFailure::InvalidResponse(format!("malformed JSON: {e}")))?;
        let rate = data
            .rate
            .ok_or_else(|| ProviderFailure::InvalidResponse("missing rate".to_string()))?;
        positive_amount(rate)
    }
}

#[derive(Serialize, Debug)]
struct RateRequest {
    from: String,
    to: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    value: Decimal,
}

#[derive(Deserialize, Debug)]
struct RateResponse {
    #[serde(
        alias = "Rate",
        default,
        with = "rust_decimal::serde::arbitrary_precision_option"
    )]
    rate: Option<Decimal>,
}

#[async_trait]
impl QuoteProvider for JsonApiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "JsonApiQuote",
        skip(self, cancel),
        fields(provider = %self.name)
    )]
    async fn quote(
        &self,
        source_currency: &str,
        target_currency: &str,
        amount: Decimal,
        cancel: &CancellationToken,
    ) -> ProviderOutcome {
        ProviderOutcome {
            provider: self.name.clone(),
            result: self
                .fetch(source_currency, target_currency, amount, cancel)
                .await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> JsonApiProvider {
        JsonApiProvider::new(&HttpProviderConfig {
            name: "JsonAPI".to_string(),
            base_url: server.uri(),
            api_key: Some("test-key".to_string()),
        })
        .unwrap()
    }

    async fn mount(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/rate"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_quote() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rate"))
            .and(header("X-API-Key", "test-key"))
            .and(body_json(serde_json::json!({
                "from": "USD",
                "to": "EUR",
                "value": 100
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rate": 85.5}"#))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = provider(&server)
            .quote("usd", "eur", dec!(100), &CancellationToken::new())
            .await;

        assert_eq!(outcome, ProviderOutcome::success("JsonAPI", dec!(85.5)));
    }

    #[tokio::test]
    async fn test_http_error_is_failure() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(500).set_body_string("Error")).await;

        let outcome = provider(&server)
            .quote("USD", "EUR", dec!(100), &CancellationToken::new())
            .await;

        assert_eq!(outcome.provider, "JsonAPI");
        let reason = outcome.failure_reason().unwrap().to_string();
        assert!(reason.contains("Internal Server Error"), "{reason}");
    }

    #[tokio::test]
    async fn test_missing_rate_is_invalid_response() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_string(r#"{"invalid":"data"}"#),
        )
        .await;

        let outcome = provider(&server)
            .quote("USD", "EUR", dec!(100), &CancellationToken::new())
            .await;

        assert_eq!(
            outcome.failure_reason(),
            Some(&ProviderFailure::InvalidResponse("missing rate".to_string()))
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;

        let outcome = provider(&server)
            .quote("USD", "EUR", dec!(100), &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome.failure_reason(),
            Some(ProviderFailure::InvalidResponse(msg)) if msg.starts_with("malformed JSON")
        ));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_failure() {
        let provider = JsonApiProvider::new(&HttpProviderConfig {
            name: "JsonAPI".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: None,
        })
        .unwrap();
        let outcome = provider
            .quote("USD", "EUR", dec!(100), &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome.failure_reason(),
            Some(ProviderFailure::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_amounts_keep_full_precision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rate"))
            .and(body_string_contains(r#""value":12345678901234567.89"#))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"rate": 10518942307901251.6123}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = provider(&server)
            .quote(
                "USD",
                "EUR",
                dec!(12345678901234567.89),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.converted_amount(), Some(dec!(10518942307901251.6123)));
    }

    #[tokio::test]
    async fn test_pascal_case_rate_is_accepted() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(200).set_body_string(r#"{"Rate": 0}"#)).await;

        let outcome = provider(&server)
            .quote("USD", "EUR", dec!(100), &CancellationToken::new())
            .await;

        // Parsed, then rejected as a non-quote rather than as a missing field.
        assert!(matches!(
            outcome.failure_reason(),
            Some(ProviderFailure::InvalidResponse(msg)) if msg.starts_with("non-positive")
        ));
    }

    #[tokio::test]
    async fn test_provider_name() {
        let server = MockServer::start().await;
        assert_eq!(provider(&server).name(), "JsonAPI");
    }
}
