use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ConcurrencyLimits;

use super::calendar::trading_days;
use super::retry::RetryPolicy;
use super::{normalize_symbol, PriceCacheStore, PriceFeedProvider, PricePoint, PriceTable};

/// What happened to each requested symbol in one [`PriceService::get_prices_with_report`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PriceFetchReport {
    /// Fully covered by the cache, no external call.
    pub cache_hits: Vec<String>,
    /// Fetched from the feed and written to the cache.
    pub fetched: Vec<String>,
    /// The feed answered but had no bars in range.
    pub empty: Vec<String>,
    /// The feed failed (after retries); symbol omitted from the result.
    pub failed: Vec<(String, String)>,
}

impl PriceFetchReport {
    pub fn external_calls(&self) -> usize {
        self.fetched.len() + self.empty.len() + self.failed.len()
    }
}

/// Daily close prices backed by a permanent cache with an external feed
/// behind it.
///
/// A symbol is served from the cache only when every expected trading day in
/// the range is present; partial coverage re-fetches the whole range.
pub struct PriceService {
    store: Arc<dyn PriceCacheStore>,
    feed: Arc<dyn PriceFeedProvider>,
    limits: ConcurrencyLimits,
    retry: RetryPolicy,
    lookback_days: u32,
    clock: Arc<dyn Clock>,
    /// One lock per symbol so concurrent callers collapse onto one fetch.
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

enum SymbolResult {
    Hit(Vec<PricePoint>),
    Fetched(Vec<PricePoint>),
    Empty,
    Failed(String),
}

impl PriceService {
    pub fn new(store: Arc<dyn PriceCacheStore>, feed: Arc<dyn PriceFeedProvider>) -> Self {
        Self {
            store,
            feed,
            limits: ConcurrencyLimits::default(),
            retry: RetryPolicy::default(),
            lookback_days: 5,
            clock: Arc::new(SystemClock),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_limits(mut self, limits: ConcurrencyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    /// Closing prices for every symbol in `[start, end]`. Symbols with no data
    /// are absent from the table.
    pub async fn get_prices<I, S>(&self, symbols: I, start: NaiveDate, end: NaiveDate) -> Result<PriceTable>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.get_prices_with_report(symbols, start, end).await?.0)
    }

    pub async fn get_prices_with_report<I, S>(
        &self,
        symbols: I,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(PriceTable, PriceFetchReport)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols: BTreeSet<String> = symbols
            .into_iter()
            .map(|s| normalize_symbol(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();

        let mut table = PriceTable::new();
        let mut report = PriceFetchReport::default();
        if symbols.is_empty() || end < start {
            return Ok((table, report));
        }

        debug!(symbols = symbols.len(), start = %start, end = %end, "loading prices");

        let expected = self.expected_days(start, end);
        let mut misses = Vec::new();
        for symbol in symbols {
            match self.cached_if_complete(&symbol, start, end, &expected).await {
                Some(rows) => {
                    table.extend_points(&rows);
                    report.cache_hits.push(symbol);
                }
                None => misses.push(symbol),
            }
        }

        if !misses.is_empty() {
            info!(
                misses = misses.len(),
                batch_size = self.limits.batch_size,
                "fetching prices missing from cache"
            );
        }

        let gate = Arc::new(Semaphore::new(self.limits.max_concurrent_price_batches.max(1)));
        for batch in misses.chunks(self.limits.batch_size.max(1)) {
            let results = join_all(batch.iter().map(|symbol| {
                let gate = gate.clone();
                let expected = &expected;
                async move {
                    let _permit = gate.acquire_owned().await;
                    let result = self.load_symbol(symbol, start, end, expected).await;
                    (symbol.clone(), result)
                }
            }))
            .await;

            for (symbol, result) in results {
                match result {
                    SymbolResult::Hit(rows) => {
                        table.extend_points(&rows);
                        report.cache_hits.push(symbol);
                    }
                    SymbolResult::Fetched(rows) => {
                        table.extend_points(&rows);
                        report.fetched.push(symbol);
                    }
                    SymbolResult::Empty => report.empty.push(symbol),
                    SymbolResult::Failed(reason) => report.failed.push((symbol, reason)),
                }
            }
        }

        Ok((table, report))
    }

    /// Close for `symbol` on `date`, falling back to the most recent earlier
    /// bar within the lookback window.
    pub async fn price_on(&self, symbol: &str, date: NaiveDate) -> Result<Option<(NaiveDate, Decimal)>> {
        let start = date - Duration::days(i64::from(self.lookback_days));
        let table = self.get_prices([symbol], start, date).await?;
        Ok(table.close_on_or_before(symbol, date, self.lookback_days))
    }

    /// Weekdays in range, excluding today and later: today's bar is not
    /// published until after the close.
    fn expected_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let last_settled = end.min(self.clock.yesterday());
        trading_days(start, last_settled)
    }

    async fn cached_if_complete(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        expected: &[NaiveDate],
    ) -> Option<Vec<PricePoint>> {
        let rows = match self.store.get_range(symbol, start, end).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(symbol, error = %err, "price cache read failed, treating as miss");
                return None;
            }
        };

        let present: HashSet<NaiveDate> = rows.iter().map(|p| p.date).collect();
        let missing = expected.iter().filter(|d| !present.contains(d)).count();
        if missing == 0 {
            debug!(symbol, rows = rows.len(), "price cache hit");
            Some(rows)
        } else {
            debug!(symbol, cached = rows.len(), missing, "partial price coverage, refetching");
            None
        }
    }

    async fn symbol_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.in_flight.lock().await;
        locks.entry(symbol.to_string()).or_default().clone()
    }

    async fn load_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        expected: &[NaiveDate],
    ) -> SymbolResult {
        let lock = self.symbol_lock(symbol).await;
        let result = {
            let _held = lock.lock().await;
            self.load_symbol_locked(symbol, start, end, expected).await
        };

        // The map and this call hold the only references when nobody waits.
        let mut locks = self.in_flight.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(symbol);
        }
        result
    }

    async fn load_symbol_locked(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        expected: &[NaiveDate],
    ) -> SymbolResult {
        // Another caller may have filled the cache while we waited.
        if let Some(rows) = self.cached_if_complete(symbol, start, end, expected).await {
            return SymbolResult::Hit(rows);
        }

        let operation = format!("{} history {symbol}", self.feed.name());
        let fetched = self
            .retry
            .run(&operation, || self.feed.get_historical(symbol, start, end))
            .await;

        let points: Vec<PricePoint> = match fetched {
            Ok(points) => points
                .into_iter()
                .filter(|p| p.is_eod() && p.date >= start && p.date <= end)
                .map(|mut p| {
                    p.symbol = symbol.to_string();
                    p
                })
                .collect(),
            Err(err) => {
                warn!(symbol, provider = self.feed.name(), error = %err, "price fetch failed");
                return SymbolResult::Failed(err.to_string());
            }
        };

        if points.is_empty() {
            warn!(symbol, start = %start, end = %end, "price feed returned no bars");
            return SymbolResult::Empty;
        }

        match self.store.upsert_prices(&points).await {
            Ok(written) => debug!(symbol, written, "prices cached"),
            Err(err) => warn!(symbol, error = %err, "failed to cache fetched prices"),
        }
        SymbolResult::Fetched(points)
    }
}
