use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use super::PricePoint;

/// Permanent price cache. Historical bars never change, so rows are kept
/// forever; writes are upserts keyed by `(symbol, date, intraday marker)` and
/// concurrent duplicate writes are harmless.
#[async_trait::async_trait]
pub trait PriceCacheStore: Send + Sync {
    /// End-of-day rows for `symbol` with `start <= date <= end`, ascending.
    async fn get_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>>;

    /// Insert or replace rows. Returns how many rows were written.
    async fn upsert_prices(&self, prices: &[PricePoint]) -> Result<usize>;
}

type PriceKey = (NaiveDate, Option<DateTime<Utc>>);

#[derive(Default)]
pub struct MemoryPriceCacheStore {
    prices: tokio::sync::Mutex<BTreeMap<String, BTreeMap<PriceKey, PricePoint>>>,
}

impl MemoryPriceCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_count(&self) -> usize {
        let prices = self.prices.lock().await;
        prices.values().map(BTreeMap::len).sum()
    }
}

#[async_trait::async_trait]
impl PriceCacheStore for MemoryPriceCacheStore {
    async fn get_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        if end < start {
            return Ok(Vec::new());
        }
        let prices = self.prices.lock().await;
        let Some(series) = prices.get(&super::normalize_symbol(symbol)) else {
            return Ok(Vec::new());
        };
        Ok(series
            .range((start, None)..=(end, None))
            .map(|(_, point)| point)
            .filter(|point| point.is_eod())
            .cloned()
            .collect())
    }

    async fn upsert_prices(&self, prices: &[PricePoint]) -> Result<usize> {
        if prices.is_empty() {
            return Ok(0);
        }
        let mut store = self.prices.lock().await;
        for price in prices {
            store
                .entry(super::normalize_symbol(&price.symbol))
                .or_default()
                .insert((price.date, price.intraday_at), price.clone());
        }
        Ok(prices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() -> Result<()> {
        let store = MemoryPriceCacheStore::new();
        store
            .upsert_prices(&[PricePoint::close("AAPL", date(2), dec!(185), "a")])
            .await?;
        store
            .upsert_prices(&[PricePoint::close("AAPL", date(2), dec!(186), "b")])
            .await?;

        let rows = store.get_range("aapl", date(1), date(31)).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, dec!(186));
        assert_eq!(store.row_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn range_excludes_intraday_rows() -> Result<()> {
        let store = MemoryPriceCacheStore::new();
        let mut intraday = PricePoint::close("AAPL", date(3), dec!(187), "live");
        intraday.intraday_at = Some(Utc::now());
        store
            .upsert_prices(&[
                PricePoint::close("AAPL", date(3), dec!(186), "eod"),
                intraday,
            ])
            .await?;

        let rows = store.get_range("AAPL", date(3), date(3)).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, dec!(186));
        assert_eq!(store.row_count().await, 2);
        Ok(())
    }
}
