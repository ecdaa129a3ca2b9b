//! Conversion request value object and its structural validation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of an ISO 4217 alphabetic currency code.
pub const CURRENCY_CODE_LEN: usize = 3;

/// Reasons a well-formed request is rejected before any provider is contacted.
///
/// Checks run in declaration order and the first failing one is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("source currency is required")]
    MissingSourceCurrency,

    #[error("target currency is required")]
    MissingTargetCurrency,

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("source currency must be a 3-letter ISO code")]
    InvalidSourceCurrency,

    #[error("target currency must be a 3-letter ISO code")]
    InvalidTargetCurrency,
}

/// A single "convert `amount` of `source_currency` into `target_currency`" ask.
///
/// Codes are kept exactly as received; normalisation happens on the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub source_currency: String,
    pub target_currency: String,
    pub amount: Decimal,
}

impl ConversionRequest {
    pub fn new(
        source_currency: impl Into<String>,
        target_currency: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            source_currency: source_currency.into(),
            target_currency: target_currency.into(),
            amount,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_currency.trim().is_empty() {
            return Err(ValidationError::MissingSourceCurrency);
        }
        if self.target_currency.trim().is_empty() {
            return Err(ValidationError::MissingTargetCurrency);
        }
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.source_currency.chars().count() != CURRENCY_CODE_LEN {
            return Err(ValidationError::InvalidSourceCurrency);
        }
        if self.target_currency.chars().count() != CURRENCY_CODE_LEN {
            return Err(ValidationError::InvalidTargetCurrency);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_valid_request() {
        let request = ConversionRequest::new("USD", "EUR", dec!(100));
        assert_eq!(request.validate(), Ok(()));
    }

    #[test]
    fn test_lowercase_codes_are_structurally_valid() {
        let request = ConversionRequest::new("usd", "eur", dec!(0.01));
        assert_eq!(request.validate(), Ok(()));
    }

    #[test]
    fn test_each_invalid_field_has_its_own_error() {
        let cases = [
            ("", "EUR", dec!(100), ValidationError::MissingSourceCurrency),
            ("   ", "EUR", dec!(100), ValidationError::MissingSourceCurrency),
            ("USD", "", dec!(100), ValidationError::MissingTargetCurrency),
            ("USD", "EUR", dec!(0), ValidationError::NonPositiveAmount),
            ("USD", "EUR", dec!(-50), ValidationError::NonPositiveAmount),
            ("US", "EUR", dec!(100), ValidationError::InvalidSourceCurrency),
            ("USDX", "EUR", dec!(100), ValidationError::InvalidSourceCurrency),
            ("USD", "EU", dec!(100), ValidationError::InvalidTargetCurrency),
        ];

        for (source, target, amount, expected) in cases {
            let request = ConversionRequest::new(source, target, amount);
            assert_eq!(
                request.validate(),
                Err(expected.clone()),
                "request {source:?} -> {target:?} ({amount})"
            );
        }
    }

    #[test]
    fn test_blank_source_reported_before_bad_amount() {
        let request = ConversionRequest::new("", "", dec!(-1));
        assert_eq!(
            request.validate(),
            Err(ValidationError::MissingSourceCurrency)
        );
    }

    #[test]
    fn test_error_messages_name_the_field() {
        assert!(
            ValidationError::MissingSourceCurrency
                .to_string()
                .contains("source currency")
        );
        assert!(
            ValidationError::NonPositiveAmount
                .to_string()
                .contains("greater than zero")
        );
        assert!(
            ValidationError::InvalidTargetCurrency
                .to_string()
                .contains("3-letter ISO code")
        );
    }
}
