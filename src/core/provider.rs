//! Quote provider abstraction and per-call outcome

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a single provider call did not produce a converted amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    #[error("timed out after {} ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("upstream returned {0}")]
    Status(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("provider task failed: {0}")]
    Panicked(String),
}

impl ProviderFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderFailure::TimedOut(_))
    }
}

/// Result of invoking one provider once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOutcome {
    pub provider: String,
    pub result: Result<Decimal, ProviderFailure>,
}

impl ProviderOutcome {
    pub fn success(provider: impl Into<String>, converted_amount: Decimal) -> Self {
        Self {
            provider: provider.into(),
            result: Ok(converted_amount),
        }
    }

    pub fn failure(provider: impl Into<String>, reason: ProviderFailure) -> Self {
        Self {
            provider: provider.into(),
            result: Err(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn converted_amount(&self) -> Option<Decimal> {
        self.result.as_ref().ok().copied()
    }

    pub fn failure_reason(&self) -> Option<&ProviderFailure> {
        self.result.as_ref().err()
    }
}

/// A backend able to quote a conversion.
///
/// Implementations make exactly one attempt per call, never return a fault to
/// the caller (every problem becomes a failed [`ProviderOutcome`] carrying
/// [`QuoteProvider::name`]), and stop promptly once `cancel` fires.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn quote(
        &self,
        source_currency: &str,
        target_currency: &str,
        amount: Decimal,
        cancel: &CancellationToken,
    ) -> ProviderOutcome;
}
