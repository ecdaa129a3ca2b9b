//! Best-quote aggregation across every registered provider
//!
//! A call validates the request, spawns one task per provider, waits for all of
//! them, and picks the largest converted amount. Each task runs under its own
//! timeout and a cancellation token derived from the caller's, so a slow or
//! failing provider never holds up or aborts its siblings.

use super::provider::{ProviderFailure, ProviderOutcome, QuoteProvider};
use super::request::ConversionRequest;
use super::result::{AggregationResult, BestQuote};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Upper bound for a single provider call.
    pub provider_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

pub struct QuoteAggregator {
    providers: Vec<Arc<dyn QuoteProvider>>,
    config: AggregatorConfig,
}

impl QuoteAggregator {
    /// `providers` order is the registration order used to break ties.
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, config: AggregatorConfig) -> Self {
        Self { providers, config }
    }

    pub fn with_defaults(providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        Self::new(providers, AggregatorConfig::default())
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    #[instrument(
        name = "BestQuote",
        skip(self, request, cancel),
        fields(
            source = %request.source_currency,
            target = %request.target_currency,
            amount = %request.amount
        )
    )]
    pub async fn get_best_quote(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> AggregationResult {
        if let Err(e) = request.validate() {
            warn!(error = %e, "Rejected conversion request");
            return AggregationResult::rejected(&e);
        }

        info!(
            providers = self.providers.len(),
            "Processing conversion request {} -> {}, amount {}",
            request.source_currency,
            request.target_currency,
            request.amount
        );

        let outcomes = self.fan_out(request, cancel).await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(amount) => {
                    debug!(provider = %outcome.provider, converted = %amount, "Provider returned quote")
                }
                Err(reason) if reason.is_timeout() => {
                    warn!(provider = %outcome.provider, error = %reason, "Provider timed out")
                }
                Err(reason) => warn!(provider = %outcome.provider, error = %reason, "Provider failed"),
            }
        }

        let Some((provider, converted_amount)) = select_best(&outcomes) else {
            warn!("No providers returned successful results");
            return AggregationResult::all_failed(outcomes);
        };

        let Some(rate) = converted_amount.checked_div(request.amount) else {
            error!(
                provider,
                converted = %converted_amount,
                amount = %request.amount,
                "Effective rate could not be computed"
            );
            return AggregationResult::internal_error(outcomes);
        };

        let best = BestQuote {
            source_currency: request.source_currency.to_uppercase(),
            target_currency: request.target_currency.to_uppercase(),
            amount: request.amount,
            converted_amount,
            rate,
            provider: provider.to_string(),
        };
        info!(provider = %best.provider, rate = %best.rate, "Best rate found");

        AggregationResult::success(best, outcomes)
    }

    /// Runs every provider concurrently and returns their outcomes in
    /// registration order.
    async fn fan_out(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Vec<ProviderOutcome> {
        // Tasks outliving this call (e.g. the caller drops us) get cancelled.
        let scope = cancel.child_token();
        let _scope_guard = scope.clone().drop_guard();

        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                debug!(provider = provider.name(), "Querying provider");
                let provider = Arc::clone(provider);
                let request = request.clone();
                let scope = scope.clone();
                let timeout = self.config.provider_timeout;
                tokio::spawn(async move {
                    quote_with_timeout(provider.as_ref(), &request, &scope, timeout).await
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(&self.providers)
            .map(|(joined, provider)| {
                joined.unwrap_or_else(|e| {
                    error!(provider = provider.name(), error = %e, "Provider task failed");
                    ProviderOutcome::failure(provider.name(), ProviderFailure::Panicked(e.to_string()))
                })
            })
            .collect()
    }
}

/// Calls one provider under a child token that is cancelled either by the
/// parent or by this call's own deadline, whichever comes first.
async fn quote_with_timeout(
    provider: &dyn QuoteProvider,
    request: &ConversionRequest,
    parent: &CancellationToken,
    timeout: Duration,
) -> ProviderOutcome {
    let child = parent.child_token();
    let _child_guard = child.clone().drop_guard();

    tokio::select! {
        biased;
        _ = parent.cancelled() => {
            ProviderOutcome::failure(provider.name(), ProviderFailure::Cancelled)
        }
        outcome = provider.quote(
            &request.source_currency,
            &request.target_currency,
            request.amount,
            &child,
        ) => outcome,
        _ = tokio::time::sleep(timeout) => {
            ProviderOutcome::failure(provider.name(), ProviderFailure::TimedOut(timeout))
        }
    }
}

/// Picks the successful outcome with the strictly greatest converted amount.
/// Ties keep the earliest outcome, i.e. the earliest registered provider.
pub fn select_best(outcomes: &[ProviderOutcome]) -> Option<(&str, Decimal)> {
    let mut best: Option<(&str, Decimal)> = None;
    for outcome in outcomes {
        let Ok(amount) = &outcome.result else {
            continue;
        };
        let amount = *amount;
        if best.is_none_or(|(_, top)| amount > top) {
            best = Some((outcome.provider.as_str(), amount));
        }
    }
    best
}
