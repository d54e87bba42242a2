#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use wealthline::market_data::calendar::trading_days;
use wealthline::market_data::{PriceFeedProvider, PricePoint, SymbolMatch};
use wealthline::models::{Id, SecurityType};
use wealthline::portfolio::{
    AccountBreakdown, PortfolioSnapshot, PriceSource, SecurityValuation, SnapshotType,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Price feed serving a flat close per symbol on every weekday, with call
/// accounting.
#[derive(Default)]
pub struct MockPriceFeed {
    closes: BTreeMap<String, Decimal>,
    valid: BTreeSet<String>,
    directory: Vec<SymbolMatch>,
    failing: BTreeSet<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// A valid symbol with a flat close.
    pub fn with_close(mut self, symbol: &str, close: Decimal) -> Self {
        self.closes.insert(symbol.to_string(), close);
        self.valid.insert(symbol.to_string());
        self
    }

    pub fn with_listing(mut self, symbol: &str, name: &str) -> Self {
        self.directory.push(SymbolMatch::new(symbol, name));
        self
    }

    pub fn failing_for(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self.valid.insert(symbol.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceFeedProvider for MockPriceFeed {
    async fn get_historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((symbol.to_string(), start, end));
        if self.failing.contains(symbol) {
            return Err(anyhow!("mock feed unavailable for {symbol}"));
        }
        let Some(close) = self.closes.get(symbol) else {
            return Ok(Vec::new());
        };
        Ok(trading_days(start, end)
            .into_iter()
            .map(|d| PricePoint::close(symbol, d, *close, "mock"))
            .collect())
    }

    async fn validate_symbol(&self, symbol: &str) -> Result<bool> {
        Ok(self.valid.contains(symbol))
    }

    async fn search_by_name(&self, _name: &str) -> Result<Vec<SymbolMatch>> {
        Ok(self.directory.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// User-level snapshot with one equity line per account.
///
/// `accounts` is `(account id, securities value, recorded cash)`.
pub fn user_snapshot(
    user_id: &str,
    day: NaiveDate,
    snapshot_type: SnapshotType,
    accounts: &[(&str, Decimal, Option<Decimal>)],
) -> PortfolioSnapshot {
    let mut securities = Vec::new();
    let mut breakdowns = Vec::new();
    for (account_id, value, cash) in accounts {
        securities.push(SecurityValuation {
            account_id: Id::from(*account_id),
            security_id: format!("{account_id}-holding"),
            symbol: None,
            security_type: SecurityType::Equity,
            quantity: Decimal::ONE,
            price: Some(*value),
            price_date: Some(day),
            market_value: *value,
            cost_basis: *value,
            price_source: PriceSource::Market,
        });
        breakdowns.push(AccountBreakdown {
            account_id: Id::from(*account_id),
            securities_value: *value,
            cash_value: *cash,
            total_value: *value + cash.unwrap_or(Decimal::ZERO),
            cost_basis: *value,
        });
    }
    PortfolioSnapshot::from_parts(
        Id::from(user_id),
        day,
        snapshot_type,
        securities,
        breakdowns,
        Utc::now(),
    )
}
