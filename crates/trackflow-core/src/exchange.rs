//! Exchange-rate tables and two-hop currency conversion.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rates relative to `base`, as published by the exchange-rate provider.
///
/// `rates[base]` is normally `1.0`; conversion between two non-base
/// currencies goes through the base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRates {
    /// Rate for `currency`, treating the base as `1.0` even if the table omits it.
    pub fn rate(&self, currency: &str) -> Option<f64> {
        match self.rates.get(currency) {
            Some(&r) if r.is_finite() && r > 0.0 => Some(r),
            Some(_) => None,
            None if currency == self.base => Some(1.0),
            None => None,
        }
    }

    /// Convert `amount` from one currency to another, rounded to two decimals.
    ///
    /// Returns `None` when either rate is missing from the table.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Option<f64> {
        if from == to {
            return Some(amount);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        let converted = amount / from_rate * to_rate;
        Some(round_cents(converted))
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
