//! Aggregation result returned to callers

use super::provider::ProviderOutcome;
use super::request::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Display;

pub const SUCCESS_MESSAGE: &str = "Success";
pub const ALL_FAILED_MESSAGE: &str = "All exchange rate providers failed or are unavailable";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuoteStatus {
    Success,
    ValidationError,
    AllProvidersFailed,
    InternalError,
}

impl QuoteStatus {
    /// HTTP-style status class used by the wire encodings.
    pub fn status_code(&self) -> u16 {
        match self {
            QuoteStatus::Success => 200,
            QuoteStatus::ValidationError => 400,
            QuoteStatus::AllProvidersFailed | QuoteStatus::InternalError => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QuoteStatus::Success)
    }
}

impl Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                QuoteStatus::Success => "success",
                QuoteStatus::ValidationError => "validation error",
                QuoteStatus::AllProvidersFailed => "all providers failed",
                QuoteStatus::InternalError => "internal error",
            }
        )
    }
}

/// The winning quote, with codes normalised to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestQuote {
    pub source_currency: String,
    pub target_currency: String,
    pub amount: Decimal,
    pub converted_amount: Decimal,
    /// `converted_amount / amount`
    pub rate: Decimal,
    pub provider: String,
}

#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub status: QuoteStatus,
    pub message: String,
    pub best: Option<BestQuote>,
    /// Every provider outcome in registration order. Diagnostic only; wire
    /// encodings never expose it.
    pub outcomes: Vec<ProviderOutcome>,
    pub produced_at: DateTime<Utc>,
}

impl AggregationResult {
    pub fn success(best: BestQuote, outcomes: Vec<ProviderOutcome>) -> Self {
        Self::new(
            QuoteStatus::Success,
            SUCCESS_MESSAGE.to_string(),
            Some(best),
            outcomes,
        )
    }

    pub fn rejected(error: &ValidationError) -> Self {
        Self::new(
            QuoteStatus::ValidationError,
            error.to_string(),
            None,
            Vec::new(),
        )
    }

    pub fn all_failed(outcomes: Vec<ProviderOutcome>) -> Self {
        Self::new(
            QuoteStatus::AllProvidersFailed,
            ALL_FAILED_MESSAGE.to_string(),
            None,
            outcomes,
        )
    }

    pub fn internal_error(outcomes: Vec<ProviderOutcome>) -> Self {
        Self::new(
            QuoteStatus::InternalError,
            INTERNAL_ERROR_MESSAGE.to_string(),
            None,
            outcomes,
        )
    }

    fn new(
        status: QuoteStatus,
        message: String,
        best: Option<BestQuote>,
        outcomes: Vec<ProviderOutcome>,
    ) -> Self {
        Self {
            status,
            message,
            best,
            outcomes,
            produced_at: Utc::now(),
        }
    }

    pub fn converted_amount(&self) -> Option<Decimal> {
        self.best.as_ref().map(|b| b.converted_amount)
    }
}
