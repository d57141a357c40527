use std::collections::HashMap;

use async_trait::async_trait;
use ilp_core::Asset;
use ilp_settlement::types::rescale;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum RatesError {
    #[error("no exchange rate for asset {0}")]
    MissingRate(String),

    #[error("converted amount out of range: {amount} {from} -> {to}")]
    Overflow { amount: u64, from: String, to: String },
}

/// Exchange-rate collaborator.
#[async_trait]
pub trait ExchangeRates: Send + Sync {
    /// Convert `amount` of `source` into units of `destination`, rounding down.
    async fn convert(&self, amount: u64, source: &Asset, destination: &Asset) -> Result<u64, RatesError>;
}

/// Static prices per asset code, all quoted against one common base unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedRates {
    prices: HashMap<String, f64>,
}

impl FixedRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, asset_code: impl Into<String>, price: f64) -> Self {
        self.prices.insert(asset_code.into(), price);
        self
    }

    fn price(&self, asset_code: &str) -> Result<f64, RatesError> {
        self.prices
            .get(asset_code)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| RatesError::MissingRate(asset_code.to_string()))
    }
}

/// Same-code conversion is exact integer rescaling. Cross-asset conversion
/// goes through `f64`, so amounts above 2^53 lose their low digits before
/// the rate is applied.
#[async_trait]
impl ExchangeRates for FixedRates {
    async fn convert(&self, amount: u64, source: &Asset, destination: &Asset) -> Result<u64, RatesError> {
        let overflow = || RatesError::Overflow {
            amount,
            from: source.to_string(),
            to: destination.to_string(),
        };
        if source.code == destination.code {
            return rescale(amount, source.scale, destination.scale).ok_or_else(overflow);
        }

        let rate = self.price(&source.code)? / self.price(&destination.code)?;
        let scale_shift = i32::from(destination.scale) - i32::from(source.scale);
        let converted = (amount as f64 * rate * 10f64.powi(scale_shift)).floor();
        if !converted.is_finite() || converted < 0.0 || converted >= u64::MAX as f64 {
            return Err(overflow());
        }
        Ok(converted as u64)
    }
}
