use super::util::{endpoint_url, fetch_body, http_client, positive_amount};
use crate::core::config::HttpProviderConfig;
use crate::core::{ProviderFailure, ProviderOutcome, QuoteProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const API_KEY_HEADER: &str = "Api-Key";

/// Provider speaking `POST /exchange` with a nested `exchange` object and
/// answering with a `{statusCode, message, data: {total}}` envelope.
pub struct ExchangeApiProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize, Debug)]
struct ExchangeEnvelope {
    exchange: ExchangeRequest,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest {
    source_currency: String,
    target_currency: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    quantity: Decimal,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    /// Upstreams send this either as a number or as a string.
    #[serde(alias = "StatusCode", default)]
    status_code: Option<serde_json::Value>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
    #[serde(alias = "Data", default)]
    data: Option<ExchangeData>,
}

#[derive(Deserialize, Debug)]
struct ExchangeData {
    #[serde(
        alias = "Total",
        default,
        with = "rust_decimal::serde::arbitrary_precision_option"
    )]
    total: Option<Decimal>,
}

impl ExchangeApiProvider {
    pub fn new(config: &HttpProviderConfig) -> Result<Self> {
        Ok(ExchangeApiProvider {
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
        let url = endpoint_url(&self.base_url, "exchange");
        debug!("Requesting exchange from {}", url);

        let body = ExchangeEnvelope {
            exchange: ExchangeRequest {
                source_currency: from.to_uppercase(),
                target_currency: to.to_uppercase(),
                quantity: amount,
            },
        };
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let text = fetch_body(request, cancel).await?;
        parse_total(&text)
    }
}

fn parse_total(text: &str) -> Result<Decimal, ProviderFailure> {
    let response: ExchangeResponse = serde_json::from_str(text)
        .map_err(|e| ProviderFailure::InvalidResponse(format!("malformed JSON: {e}")))?;
    debug!(
        status_code = ?response.status_code,
        message = ?response.message,
        "Exchange envelope received"
    );

    let total = response
        .data
        .and_then(|data| data.total)
        .ok_or_else(|| ProviderFailure::InvalidResponse("missing data.total".to_string()))?;
    positive_amount(total)
}

#[async_trait]
impl QuoteProvider for ExchangeApiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "ExchangeApiQuote",
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
