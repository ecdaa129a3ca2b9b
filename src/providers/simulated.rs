use crate::core::config::SimulatedProviderConfig;
use crate::core::{ProviderFailure, ProviderOutcome, QuoteProvider};
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Offline provider answering from a static rate table after an artificial
/// delay, with a uniform random wobble of up to `variation` around each rate.
pub struct SimulatedProvider {
    name: String,
    latency: Duration,
    variation: Decimal,
    rates: BTreeMap<String, Decimal>,
}

impl SimulatedProvider {
    pub fn new(config: &SimulatedProviderConfig) -> Self {
        SimulatedProvider {
            name: config.name.clone(),
            latency: Duration::from_millis(config.latency_ms),
            variation: config.variation.abs(),
            rates: config
                .rates
                .iter()
                .map(|(pair, rate)| (pair.to_uppercase(), *rate))
                .collect(),
        }
    }

    /// Base rate for the pair, `1` when the pair is unknown.
    fn base_rate(&self, from: &str, to: &str) -> Decimal {
        let key = format!("{}/{}", from.to_uppercase(), to.to_uppercase());
        self.rates.get(&key).copied().unwrap_or(Decimal::ONE)
    }

    fn jitter(&self) -> Decimal {
        if self.variation.is_zero() {
            return Decimal::ZERO;
        }
        // Uniform step in [-1, 1] with four decimal places.
        let step = rand::rng().random_range(-10_000i64..=10_000);
        self.variation * Decimal::new(step, 4)
    }

    fn convert(&self, from: &str, to: &str, amount: Decimal) -> Result<Decimal, ProviderFailure> {
        let rate = self.base_rate(from, to) * (Decimal::ONE + self.jitter());
        debug!(%rate, "Simulated rate");
        amount
            .checked_mul(rate)
            .ok_or_else(|| ProviderFailure::InvalidResponse("converted amount overflow".to_string()))
    }
}

#[async_trait]
impl QuoteProvider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "SimulatedQuote",
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
        if !self.latency.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return ProviderOutcome::failure(&self.name, ProviderFailure::Cancelled);
                }
                _ = tokio::time::sleep(self.latency) => {}
            }
        }

        ProviderOutcome {
            provider: self.name.clone(),
            result: self.convert(source_currency, target_currency, amount),
        }
    }
}
