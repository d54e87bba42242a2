use anyhow::Result;
use chrono::NaiveDate;

use super::{PricePoint, SymbolMatch};

/// External end-of-day price feed.
#[async_trait::async_trait]
pub trait PriceFeedProvider: Send + Sync {
    /// Daily bars for `symbol` in `[start, end]`. An unknown symbol or an empty
    /// range is `Ok(vec![])`, not an error.
    async fn get_historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>>;

    /// Whether `symbol` exists in the feed's symbol directory.
    async fn validate_symbol(&self, symbol: &str) -> Result<bool>;

    /// Free-text search over the feed's symbol directory.
    async fn search_by_name(&self, name: &str) -> Result<Vec<SymbolMatch>>;

    fn name(&self) -> &str;
}

/// Feed that knows nothing. Lets history and scoring run offline.
pub struct NoopPriceFeed;

#[async_trait::async_trait]
impl PriceFeedProvider for NoopPriceFeed {
    async fn get_historical(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        Ok(Vec::new())
    }

    async fn validate_symbol(&self, _symbol: &str) -> Result<bool> {
        Ok(false)
    }

    async fn search_by_name(&self, _name: &str) -> Result<Vec<SymbolMatch>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
