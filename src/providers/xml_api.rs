use super::util::{endpoint_url, fetch_body, http_client, positive_amount};
use crate::core::config::HttpProviderConfig;
use crate::core::{ProviderFailure, ProviderOutcome, QuoteProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const API_KEY_HEADER: &str = "X-API-Key";
const ROOT_ELEMENT: &str = "XML";

/// Provider speaking `POST /convert` with an `<XML>` document in both directions.
pub struct XmlApiProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize, Debug)]
struct ConvertRequest {
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "To")]
    to: String,
    #[serde(rename = "Amount")]
    amount: String,
}

#[derive(Deserialize, Debug)]
struct ConvertResponse {
    #[serde(rename = "Result")]
    result: Option<String>,
}

impl XmlApiProvider {
    pub fn new(config: &HttpProviderConfig) -> Result<Self> {
        Ok(XmlApiProvider {
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
        let url = endpoint_url(&self.base_url, "convert");
        debug!("Requesting conversion from {}", url);

        let document = ConvertRequest {
            from: from.to_uppercase(),
            to: to.to_uppercase(),
            amount: amount.to_string(),
        };
        let body = quick_xml::se::to_string_with_root(ROOT_ELEMENT, &document)
            .map_err(|e| ProviderFailure::Transport(format!("failed to encode request: {e}")))?;

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/xml")
            .body(body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let text = fetch_body(request, cancel).await?;
        parse_result(&text)
    }
}

fn parse_result(text: &str) -> Result<Decimal, ProviderFailure> {
    let data: ConvertResponse = quick_xml::de::from_str(text)
        .map_err(|e| ProviderFailure::InvalidResponse(format!("malformed XML: {e}")))?;
    let raw = data
        .result
        .ok_or_else(|| ProviderFailure::InvalidResponse("missing Result element".to_string()))?;
    let amount = Decimal::from_str(raw.trim()).map_err(|e| {
        ProviderFailure::InvalidResponse(format!("Result {raw:?} is not a number: {e}"))
    })?;
    positive_amount(amount)
}

#[async_trait]
impl QuoteProvider for XmlApiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "XmlApiQuote",
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
