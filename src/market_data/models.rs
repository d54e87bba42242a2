use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One daily bar for a canonical symbol.
///
/// End-of-day rows have no `intraday_at`; at most one of them exists per
/// `(symbol, date)` in a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_close: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    /// Set only for intraday rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intraday_at: Option<DateTime<Utc>>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl PricePoint {
    pub fn close(symbol: impl Into<String>, date: NaiveDate, close: Decimal, source: impl Into<String>) -> Self {
        Self {
            symbol: normalize_symbol(&symbol.into()),
            date,
            close,
            open: None,
            high: None,
            low: None,
            adjusted_close: None,
            volume: None,
            intraday_at: None,
            source: source.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn is_eod(&self) -> bool {
        self.intraday_at.is_none()
    }

    /// Store key: `(symbol, date, intraday marker)`.
    pub fn key(&self) -> (String, NaiveDate, Option<DateTime<Utc>>) {
        (self.symbol.clone(), self.date, self.intraday_at)
    }
}

/// A search hit from the price feed's symbol directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
}

impl SymbolMatch {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            exchange: None,
        }
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Daily closes per symbol. Symbols without any data are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable {
    closes: BTreeMap<String, BTreeMap<NaiveDate, Decimal>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: &str, date: NaiveDate, close: Decimal) {
        self.closes
            .entry(normalize_symbol(symbol))
            .or_default()
            .insert(date, close);
    }

    /// Add EOD rows; intraday rows are ignored.
    pub fn extend_points<'a>(&mut self, points: impl IntoIterator<Item = &'a PricePoint>) {
        for point in points.into_iter().filter(|p| p.is_eod()) {
            self.insert(&point.symbol, point.date, point.close);
        }
    }

    pub fn series(&self, symbol: &str) -> Option<&BTreeMap<NaiveDate, Decimal>> {
        self.closes.get(&normalize_symbol(symbol))
    }

    pub fn close_on(&self, symbol: &str, date: NaiveDate) -> Option<Decimal> {
        self.series(symbol).and_then(|series| series.get(&date).copied())
    }

    /// Close on `date`, or on the most recent earlier date no more than
    /// `lookback_days` back (weekends and holidays).
    pub fn close_on_or_before(
        &self,
        symbol: &str,
        date: NaiveDate,
        lookback_days: u32,
    ) -> Option<(NaiveDate, Decimal)> {
        let series = self.series(symbol)?;
        let earliest = date - Duration::days(i64::from(lookback_days));
        series
            .range(earliest..=date)
            .next_back()
            .map(|(day, close)| (*day, *close))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.closes.contains_key(&normalize_symbol(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn lookback_reuses_previous_trading_day() {
        let mut table = PriceTable::new();
        table.insert("aapl", date(12), dec!(185)); // Friday

        // Monday the 15th was a market holiday.
        assert_eq!(
            table.close_on_or_before("AAPL", date(15), 5),
            Some((date(12), dec!(185)))
        );
        assert_eq!(table.close_on_or_before("AAPL", date(18), 5), None);
        assert_eq!(table.close_on_or_before("MSFT", date(12), 5), None);
    }

    #[test]
    fn intraday_rows_are_not_daily_closes() {
        let mut intraday = PricePoint::close("AAPL", date(12), dec!(190), "test");
        intraday.intraday_at = Some(Utc::now());
        let eod = PricePoint::close("AAPL", date(11), dec!(186), "test");

        let mut table = PriceTable::new();
        table.extend_points([&intraday, &eod]);

        assert_eq!(table.close_on("AAPL", date(12)), None);
        assert_eq!(table.close_on("AAPL", date(11)), Some(dec!(186)));
    }
}
