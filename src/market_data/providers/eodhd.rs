//! EODHD (End of Day Historical Data) price feed.
//!
//! Symbols are sent as `TICKER.EXCHANGE` (`AAPL.US`, `VOD.LSE`); bare tickers
//! are assumed to be US listings. US share classes are written `BRK.B` by
//! brokers and `BRK-B` by EODHD. The search endpoint doubles as the symbol
//! directory for validation and fuzzy name lookup.

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::EngineError;
use crate::market_data::{normalize_symbol, PriceFeedProvider, PricePoint, SymbolMatch};

const EODHD_BASE_URL: &str = "https://eodhd.com/api";
const SEARCH_LIMIT: u32 = 15;

/// EODHD exchange codes that are a single letter (Frankfurt, TSX Venture).
/// Any other one-letter suffix is a share class.
const SINGLE_LETTER_EXCHANGES: &[&str] = &["F", "V"];

#[derive(Debug, Deserialize)]
struct EodhdBar {
    date: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    adjusted_close: Option<f64>,
    volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EodhdSearchHit {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Exchange", default)]
    exchange: Option<String>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

pub struct EodhdPriceFeed {
    api_key: SecretString,
    client: Client,
    base_url: String,
}

impl EodhdPriceFeed {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_client(api_key, Client::new())
    }

    pub fn with_client(api_key: SecretString, client: Client) -> Self {
        Self {
            api_key,
            client,
            base_url: EODHD_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `BRK.B` -> `("BRK", "B")` when the suffix is a share class rather
    /// than an exchange.
    fn share_class(symbol: &str) -> Option<(&str, &str)> {
        let (base, suffix) = symbol.rsplit_once('.')?;
        let is_class = suffix.len() == 1
            && suffix.chars().all(|c| c.is_ascii_alphabetic())
            && !SINGLE_LETTER_EXCHANGES.contains(&suffix);
        (is_class && !base.is_empty()).then_some((base, suffix))
    }

    /// `AAPL` -> `AAPL.US`, `BRK.B` -> `BRK-B.US`; symbols that already carry
    /// an exchange suffix are passed through.
    fn feed_symbol(symbol: &str) -> String {
        let symbol = normalize_symbol(symbol);
        if let Some((base, class)) = Self::share_class(&symbol) {
            return format!("{base}-{class}.US");
        }
        if symbol.contains('.') {
            symbol
        } else {
            format!("{symbol}.US")
        }
    }

    /// Inverse of [`Self::feed_symbol`] for search hits: US listings lose the
    /// exchange and get their share class back as `.X`.
    fn canonical_symbol(code: &str, exchange: Option<&str>) -> String {
        let code = normalize_symbol(code);
        match exchange.map(normalize_symbol).as_deref() {
            None | Some("US") => match code.rsplit_once('-') {
                Some((base, class))
                    if !base.is_empty()
                        && class.len() == 1
                        && class.chars().all(|c| c.is_ascii_alphabetic()) =>
                {
                    format!("{base}.{class}")
                }
                _ => code,
            },
            Some(exchange) => format!("{code}.{exchange}"),
        }
    }

    /// `base_url` plus path segments, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid EODHD base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("EODHD base URL cannot have a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn to_decimal(value: Option<f64>) -> Option<Decimal> {
        value.and_then(|v| Decimal::from_str(&v.to_string()).ok())
    }

    fn parse_bar(symbol: &str, bar: &EodhdBar) -> Result<Option<PricePoint>> {
        let Some(close) = Self::to_decimal(bar.close) else {
            return Ok(None);
        };
        let date = NaiveDate::parse_from_str(&bar.date, "%Y-%m-%d")
            .map_err(|e| anyhow!("Failed to parse date '{}': {}", bar.date, e))?;

        Ok(Some(PricePoint {
            symbol: normalize_symbol(symbol),
            date,
            close,
            open: Self::to_decimal(bar.open),
            high: Self::to_decimal(bar.high),
            low: Self::to_decimal(bar.low),
            adjusted_close: Self::to_decimal(bar.adjusted_close),
            volume: bar.volume.filter(|v| *v >= 0.0).map(|v| v as u64),
            intraday_at: None,
            source: "eodhd".to_string(),
            fetched_at: Utc::now(),
        }))
    }

    async fn search(&self, query: &str) -> Result<Vec<EodhdSearchHit>> {
        let url = self.endpoint(&["search", query.trim()])?;
        let response = self
            .client
            .get(url)
            .query(&[
                ("api_token", self.api_key.expose_secret()),
                ("fmt", "json"),
                ("limit", &SEARCH_LIMIT.to_string()),
            ])
            .send()
            .await
            .context("EODHD search request failed")?;

        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::provider("eodhd", format!("status {status}: {body}")).into());
        }

        response
            .json()
            .await
            .context("Failed to decode EODHD search response")
    }
}

#[async_trait::async_trait]
impl PriceFeedProvider for EodhdPriceFeed {
    async fn get_historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let url = self.endpoint(&["eod", &Self::feed_symbol(symbol)])?;
        let response = self
            .client
            .get(url)
            .query(&[
                ("api_token", self.api_key.expose_secret()),
                ("from", &start.format("%Y-%m-%d").to_string()),
                ("to", &end.format("%Y-%m-%d").to_string()),
                ("fmt", "json"),
            ])
            .send()
            .await
            .context("EODHD eod request failed")?;

        // 404 means unknown symbol or no data for the range.
        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::provider("eodhd", format!("status {status}: {body}")).into());
        }

        let bars: Vec<EodhdBar> = response
            .json()
            .await
            .context("Failed to decode EODHD eod response")?;

        let mut points = Vec::with_capacity(bars.len());
        for bar in &bars {
            if let Some(point) = Self::parse_bar(symbol, bar)? {
                points.push(point);
            }
        }
        Ok(points)
    }

    async fn validate_symbol(&self, symbol: &str) -> Result<bool> {
        let wanted = normalize_symbol(symbol);
        let feed_symbol = Self::feed_symbol(&wanted);
        let query = feed_symbol.strip_suffix(".US").unwrap_or(&feed_symbol);
        let hits = self.search(query).await?;
        Ok(hits
            .iter()
            .any(|hit| Self::canonical_symbol(&hit.code, hit.exchange.as_deref()) == wanted))
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<SymbolMatch>> {
        let hits = self.search(name).await?;
        Ok(hits
            .into_iter()
            .map(|hit| SymbolMatch {
                symbol: Self::canonical_symbol(&hit.code, hit.exchange.as_deref()),
                name: hit.name.unwrap_or_default(),
                exchange: hit.exchange,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "eodhd"
    }
}
