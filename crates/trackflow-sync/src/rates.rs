//! Cached exchange-rate lookups.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use trackflow_core::ExchangeRates;

#[derive(Error, Debug)]
pub enum RateError {
    #[error("exchange-rate request failed: {0}")]
    Fetch(String),
    #[error("exchange-rate provider returned {status}")]
    Server { status: u16 },
    #[error("no exchange rate for {from} -> {to}")]
    MissingRate { from: String, to: String },
}

/// Source of rate tables keyed by base currency.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn latest(&self, base: &str) -> Result<ExchangeRates, RateError>;
}

/// Keeps one rate table per base currency for a fixed time.
pub struct RateCache {
    provider: Arc<dyn RateProvider>,
    ttl: Duration,
    tables: Mutex<HashMap<String, (Instant, ExchangeRates)>>,
}

impl RateCache {
    pub fn new(provider: Arc<dyn RateProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Rates for `base`, fetched again once the cached table is older than the TTL.
    pub async fn rates(&self, base: &str) -> Result<ExchangeRates, RateError> {
        let mut tables = self.tables.lock().await;
        if let Some((loaded, rates)) = tables.get(base) {
            if loaded.elapsed() < self.ttl {
                return Ok(rates.clone());
            }
        }
        debug!(base, "fetching exchange rates");
        let rates = self.provider.latest(base).await?;
        tables.insert(base.to_string(), (Instant::now(), rates.clone()));
        Ok(rates)
    }

    /// Convert through the `base` table, rounded to two decimals.
    pub async fn convert(
        &self,
        base: &str,
        amount: f64,
        from: &str,
        to: &str,
    ) -> Result<f64, RateError> {
        self.rates(base)
            .await?
            .convert(amount, from, to)
            .ok_or_else(|| RateError::MissingRate {
                from: from.to_string(),
                to: to.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateProvider for CountingProvider {
        async fn latest(&self, base: &str) -> Result<ExchangeRates, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if base == "XXX" {
                return Err(RateError::Server { status: 404 });
            }
            Ok(ExchangeRates {
                base: base.to_string(),
                rates: BTreeMap::from([("USD".to_string(), 1.0), ("INR".to_string(), 83.0)]),
                fetched_at: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn reuses_table_within_ttl() {
        let provider = Arc::new(CountingProvider::default());
        let cache = RateCache::new(provider.clone(), Duration::from_secs(600));

        cache.rates("USD").await.unwrap();
        cache.rates("USD").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        cache.rates("EUR").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refetches_after_ttl() {
        let provider = Arc::new(CountingProvider::default());
        let cache = RateCache::new(provider.clone(), Duration::ZERO);

        cache.rates("USD").await.unwrap();
        cache.rates("USD").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn convert_through_cache() {
        let cache = RateCache::new(Arc::new(CountingProvider::default()), Duration::from_secs(60));
        assert_eq!(cache.convert("USD", 2.0, "USD", "INR").await.unwrap(), 166.0);

        let err = cache.convert("USD", 2.0, "USD", "JPY").await.unwrap_err();
        assert!(matches!(err, RateError::MissingRate { .. }));
    }

    #[tokio::test]
    async fn provider_errors_are_not_cached() {
        let provider = Arc::new(CountingProvider::default());
        let cache = RateCache::new(provider.clone(), Duration::from_secs(60));
        assert!(cache.rates("XXX").await.is_err());
        assert!(cache.rates("XXX").await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
