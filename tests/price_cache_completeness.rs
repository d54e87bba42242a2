mod support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rust_decimal_macros::dec;
use support::{date, MockPriceFeed};
use wealthline::clock::FixedClock;
use wealthline::market_data::calendar::trading_days;
use wealthline::market_data::{
    MemoryPriceCacheStore, PriceCacheStore, PricePoint, PriceService, RetryPolicy,
};

fn service(store: Arc<MemoryPriceCacheStore>, feed: Arc<MockPriceFeed>) -> PriceService {
    PriceService::new(store, feed)
        .with_retry(RetryPolicy::once(Duration::from_secs(5)))
        .with_clock(Arc::new(FixedClock::at(date(2024, 1, 20), 12)))
}

#[tokio::test]
async fn nine_of_ten_cached_days_refetch_the_whole_range() -> Result<()> {
    let start = date(2024, 1, 1);
    let end = date(2024, 1, 12);
    let days = trading_days(start, end);
    assert_eq!(days.len(), 10);

    let store = Arc::new(MemoryPriceCacheStore::new());
    let seeded: Vec<PricePoint> = days
        .iter()
        .filter(|d| **d != date(2024, 1, 8))
        .map(|d| PricePoint::close("AAPL", *d, dec!(190), "seed"))
        .collect();
    store.upsert_prices(&seeded).await?;
    assert_eq!(store.row_count().await, 9);

    let feed = Arc::new(MockPriceFeed::new().with_close("AAPL", dec!(200)));
    let prices = service(store.clone(), feed.clone());
    let (table, report) = prices.get_prices_with_report(["AAPL"], start, end).await?;

    assert_eq!(feed.requests(), vec![("AAPL".to_string(), start, end)]);
    assert_eq!(report.fetched, vec!["AAPL".to_string()]);
    assert!(report.cache_hits.is_empty());
    assert_eq!(table.series("AAPL").map(|s| s.len()), Some(10));
    assert_eq!(table.close_on("AAPL", date(2024, 1, 8)), Some(dec!(200)));
    assert_eq!(store.row_count().await, 10);
    Ok(())
}

#[tokio::test]
async fn complete_cache_makes_no_external_call() -> Result<()> {
    let start = date(2024, 1, 1);
    let end = date(2024, 1, 12);
    let store = Arc::new(MemoryPriceCacheStore::new());
    let seeded: Vec<PricePoint> = trading_days(start, end)
        .into_iter()
        .map(|d| PricePoint::close("AAPL", d, dec!(190), "seed"))
        .collect();
    store.upsert_prices(&seeded).await?;

    let feed = Arc::new(MockPriceFeed::new().with_close("AAPL", dec!(200)));
    let prices = service(store, feed.clone());
    let (table, report) = prices.get_prices_with_report(["aapl"], start, end).await?;

    assert_eq!(feed.calls(), 0);
    assert_eq!(report.cache_hits, vec!["AAPL".to_string()]);
    assert_eq!(report.external_calls(), 0);
    assert_eq!(table.close_on("AAPL", date(2024, 1, 3)), Some(dec!(190)));
    Ok(())
}

#[tokio::test]
async fn todays_missing_bar_does_not_break_the_cache() -> Result<()> {
    // Clock on Friday 2024-01-12: that day's bar is not expected yet.
    let store = Arc::new(MemoryPriceCacheStore::new());
    let seeded: Vec<PricePoint> = trading_days(date(2024, 1, 8), date(2024, 1, 11))
        .into_iter()
        .map(|d| PricePoint::close("MSFT", d, dec!(370), "seed"))
        .collect();
    store.upsert_prices(&seeded).await?;

    let feed = Arc::new(MockPriceFeed::new().with_close("MSFT", dec!(375)));
    let prices = PriceService::new(store, feed.clone())
        .with_clock(Arc::new(FixedClock::at(date(2024, 1, 12), 15)));
    prices
        .get_prices(["MSFT"], date(2024, 1, 8), date(2024, 1, 12))
        .await?;

    assert_eq!(feed.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn one_failing_symbol_does_not_abort_the_batch() -> Result<()> {
    let store = Arc::new(MemoryPriceCacheStore::new());
    let feed = Arc::new(
        MockPriceFeed::new()
            .with_close("AAPL", dec!(200))
            .failing_for("BROKEN"),
    );
    let prices = service(store, feed);
    let (table, report) = prices
        .get_prices_with_report(["AAPL", "BROKEN", "NOPE"], date(2024, 1, 8), date(2024, 1, 12))
        .await?;

    assert!(table.contains("AAPL"));
    assert!(!table.contains("BROKEN"));
    assert_eq!(report.fetched, vec!["AAPL".to_string()]);
    assert_eq!(report.empty, vec!["NOPE".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "BROKEN");
    Ok(())
}
