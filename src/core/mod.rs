//! Core quote aggregation abstractions

pub mod aggregator;
pub mod config;
pub mod log;
pub mod provider;
pub mod request;
pub mod result;

// Re-export main types for cleaner imports
pub use aggregator::{AggregatorConfig, QuoteAggregator};
pub use provider::{ProviderFailure, ProviderOutcome, QuoteProvider};
pub use request::{ConversionRequest, ValidationError};
pub use result::{AggregationResult, BestQuote, QuoteStatus};
