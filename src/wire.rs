//! Inbound request decoding and outbound response encoding
//!
//! Three encodings are understood, each matching one of the upstream shapes:
//! `json` (`{"from","to","value"}`), `xml` (`<XML><From/><To/><Amount/></XML>`)
//! and `exchange` (`{"exchange":{"sourceCurrency","targetCurrency","quantity"}}`).
//! Responses never carry per-provider detail.

use crate::core::{AggregationResult, ConversionRequest, QuoteAggregator};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const XML_ROOT: &str = "XML";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WireFormat {
    Json,
    Xml,
    Exchange,
}

impl Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                WireFormat::Json => "json",
                WireFormat::Xml => "xml",
                WireFormat::Exchange => "exchange",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("request body is required")]
    MissingRequest,

    #[error("malformed {format} request: {reason}")]
    Malformed { format: WireFormat, reason: String },

    #[error("failed to encode {format} response: {reason}")]
    Encode { format: WireFormat, reason: String },
}

impl WireError {
    pub fn status_code(&self) -> u16 {
        match self {
            WireError::MissingRequest | WireError::Malformed { .. } => 400,
            WireError::Encode { .. } => 500,
        }
    }

    fn malformed(format: WireFormat, reason: impl Display) -> Self {
        WireError::Malformed {
            format,
            reason: reason.to_string(),
        }
    }

    fn encode(format: WireFormat, reason: impl Display) -> Self {
        WireError::Encode {
            format,
            reason: reason.to_string(),
        }
    }
}

/// An encoded response and its HTTP-style status class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status_code: u16,
    pub body: String,
}

// Inbound shapes. Missing or null fields decode to empty values so the
// aggregator's validation reports them, matching what a form-style binder
// would do.

#[derive(Deserialize, Debug)]
struct JsonRequest {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    value: Option<Decimal>,
}

#[derive(Deserialize, Debug)]
struct XmlRequest {
    #[serde(rename = "From", default)]
    from: Option<String>,
    #[serde(rename = "To", default)]
    to: Option<String>,
    #[serde(rename = "Amount", default)]
    amount: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ExchangeRequest {
    #[serde(default)]
    exchange: Option<ExchangeData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ExchangeData {
    #[serde(default)]
    source_currency: Option<String>,
    #[serde(default)]
    target_currency: Option<String>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    quantity: Option<Decimal>,
}

fn conversion_request(
    from: Option<String>,
    to: Option<String>,
    amount: Option<Decimal>,
) -> ConversionRequest {
    ConversionRequest::new(
        from.unwrap_or_default(),
        to.unwrap_or_default(),
        amount.unwrap_or_default(),
    )
}

// Outbound shapes.

#[derive(Serialize, Debug)]
struct JsonReply<'a> {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    rate: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize, Debug)]
struct XmlReply<'a> {
    #[serde(rename = "Result")]
    result: String,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ExchangeReply<'a> {
    status_code: String,
    message: &'a str,
    data: Option<ExchangeReplyData<'a>>,
}

#[derive(Serialize, Debug)]
struct ExchangeReplyData<'a> {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    total: Decimal,
    provider: &'a str,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    rate: Decimal,
}

/// Decodes an inbound body into a request. Structurally absent fields are left
/// empty for validation to reject; only an empty or unparsable body fails here.
pub fn decode_request(format: WireFormat, body: &str) -> Result<ConversionRequest, WireError> {
    if body.trim().is_empty() {
        return Err(WireError::MissingRequest);
    }

    match format {
        WireFormat::Json => {
            let request: Option<JsonRequest> =
                serde_json::from_str(body).map_err(|e| WireError::malformed(format, e))?;
            let request = request.ok_or(WireError::MissingRequest)?;
            Ok(conversion_request(request.from, request.to, request.value))
        }
        WireFormat::Xml => {
            let request: XmlRequest =
                quick_xml::de::from_str(body).map_err(|e| WireError::malformed(format, e))?;
            let amount = match request.amount.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(
                    Decimal::from_str(raw)
                        .map_err(|e| WireError::malformed(format, format!("Amount {raw:?}: {e}")))?,
                ),
            };
            Ok(conversion_request(request.from, request.to, amount))
        }
        WireFormat::Exchange => {
            let request: Option<ExchangeRequest> =
                serde_json::from_str(body).map_err(|e| WireError::malformed(format, e))?;
            let data = request
                .and_then(|r| r.exchange)
                .ok_or(WireError::MissingRequest)?;
            Ok(conversion_request(
                data.source_currency,
                data.target_currency,
                data.quantity,
            ))
        }
    }
}

/// Encodes an aggregation result. The status class is
/// [`crate::core::QuoteStatus::status_code`].
pub fn encode_response(format: WireFormat, result: &AggregationResult) -> Result<String, WireError> {
    let error = (!result.status.is_success()).then_some(result.message.as_str());
    let converted = result
        .converted_amount()
        .map_or(Decimal::ZERO, |amount| amount.normalize());

    match format {
        WireFormat::Json => serde_json::to_string(&JsonReply {
            rate: converted,
            error,
        })
        .map_err(|e| WireError::encode(format, e)),
        WireFormat::Xml => encode_xml(converted, error),
        WireFormat::Exchange => serde_json::to_string(&ExchangeReply {
            status_code: result.status.status_code().to_string(),
            message: &result.message,
            data: result.best.as_ref().map(|best| ExchangeReplyData {
                total: converted,
                provider: &best.provider,
                rate: best.rate.normalize(),
            }),
        })
        .map_err(|e| WireError::encode(format, e)),
    }
}

/// Encodes a request that never reached the aggregator.
pub fn encode_error(format: WireFormat, error: &WireError) -> Result<String, WireError> {
    let message = error.to_string();
    match format {
        WireFormat::Json => serde_json::to_string(&JsonReply {
            rate: Decimal::ZERO,
            error: Some(&message),
        })
        .map_err(|e| WireError::encode(format, e)),
        WireFormat::Xml => encode_xml(Decimal::ZERO, Some(&message)),
        WireFormat::Exchange => serde_json::to_string(&ExchangeReply {
            status_code: error.status_code().to_string(),
            message: &message,
            data: None,
        })
        .map_err(|e| WireError::encode(format, e)),
    }
}

fn encode_xml(result: Decimal, error: Option<&str>) -> Result<String, WireError> {
    let reply = XmlReply {
        result: result.to_string(),
        error,
    };
    quick_xml::se::to_string_with_root(XML_ROOT, &reply)
        .map_err(|e| WireError::encode(WireFormat::Xml, e))
}

/// Decodes `body`, runs the aggregation and encodes the reply.
///
/// Decode failures become 400-class responses in the same encoding; only a
/// failure to encode the reply itself is returned as an error.
pub async fn handle(
    format: WireFormat,
    body: &str,
    aggregator: &QuoteAggregator,
    cancel: &CancellationToken,
) -> Result<WireResponse, WireError> {
    let request = match decode_request(format, body) {
        Ok(request) => request,
        Err(e) => {
            warn!(%format, error = %e, "Could not decode request");
            return Ok(WireResponse {
                status_code: e.status_code(),
                body: encode_error(format, &e)?,
            });
        }
    };
    info!(
        %format,
        "{} API called with {} -> {}, amount {}",
        format,
        request.source_currency,
        request.target_currency,
        request.amount
    );

    let result = aggregator.get_best_quote(&request, cancel).await;
    Ok(WireResponse {
        status_code: result.status.status_code(),
        body: encode_response(format, &result)?,
    })
}
