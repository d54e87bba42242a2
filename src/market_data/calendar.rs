//! Weekday calendar used for cache completeness and price lookback.
//!
//! No exchange holiday list: holidays surface as missing bars and are covered
//! by the lookback window.

use chrono::{Datelike, NaiveDate, Weekday};

pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every weekday in `[start, end]`, ascending. Empty when `end < start`.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_trading_day(*day))
        .collect()
}
