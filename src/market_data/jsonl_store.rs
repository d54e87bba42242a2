use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use tokio::sync::Mutex;

use super::{normalize_symbol, PriceCacheStore, PricePoint};
use crate::storage::files::{read_jsonl, write_jsonl};

/// File-backed price cache: `{base}/prices/{SYMBOL}/{YEAR}.jsonl`.
///
/// Writes read-modify-write the year file, replacing rows with the same
/// `(symbol, date, intraday marker)`, so a file never holds duplicates. A
/// process-wide lock serializes writers. Malformed rows are skipped with a
/// warning on read.
pub struct JsonlPriceCacheStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlPriceCacheStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        let safe: String = normalize_symbol(symbol)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.base_path.join("prices").join(safe)
    }

    fn year_file(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year:04}.jsonl"))
    }
}

#[async_trait::async_trait]
impl PriceCacheStore for JsonlPriceCacheStore {
    async fn get_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        if end < start {
            return Ok(Vec::new());
        }

        let mut by_date: BTreeMap<NaiveDate, PricePoint> = BTreeMap::new();
        for year in start.year()..=end.year() {
            let path = self.year_file(symbol, year);
            for point in read_jsonl::<PricePoint>(&path, "price").await? {
                if point.is_eod() && point.date >= start && point.date <= end {
                    by_date.insert(point.date, point);
                }
            }
        }
        Ok(by_date.into_values().collect())
    }

    async fn upsert_prices(&self, prices: &[PricePoint]) -> Result<usize> {
        if prices.is_empty() {
            return Ok(0);
        }

        let mut grouped: HashMap<(String, i32), Vec<&PricePoint>> = HashMap::new();
        for price in prices {
            grouped
                .entry((normalize_symbol(&price.symbol), price.date.year()))
                .or_default()
                .push(price);
        }

        let _guard = self.write_lock.lock().await;
        for ((symbol, year), items) in grouped {
            let path = self.year_file(&symbol, year);
            let mut rows: BTreeMap<_, PricePoint> = read_jsonl::<PricePoint>(&path, "price")
                .await?
                .into_iter()
                .map(|p| (p.key(), p))
                .collect();
            for item in items {
                rows.insert(item.key(), item.clone());
            }
            let rows: Vec<PricePoint> = rows.into_values().collect();
            write_jsonl(&path, &rows).await?;
        }

        Ok(prices.len())
    }
}
