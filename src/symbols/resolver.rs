use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::similarity::name_similarity;
use super::{
    IdentifierMappingProvider, IdentifierType, MappingCacheStore, NoopIdentifierMapper,
    Resolution, ResolutionMethod, SymbolMapping, UnresolvedSecurity,
};
use crate::clock::{Clock, SystemClock};
use crate::config::ConcurrencyLimits;
use crate::market_data::{normalize_symbol, PriceFeedProvider, RetryPolicy};
use crate::models::Security;

const IDENTIFIER_CONFIDENCE: u8 = 95;
const TICKER_SUBSTRING_BONUS: f64 = 0.1;

/// Maps broker securities to canonical price-feed symbols.
///
/// Strategies run in order and the first success wins: direct ticker
/// validation, identifier lookup, fuzzy name search. Failures never reach the
/// caller; the security comes back unresolved and is queued in the mapping
/// cache for a later attempt.
pub struct SymbolResolver {
    cache: Arc<dyn MappingCacheStore>,
    feed: Arc<dyn PriceFeedProvider>,
    identifiers: Arc<dyn IdentifierMappingProvider>,
    limits: ConcurrencyLimits,
    retry: RetryPolicy,
    min_similarity: f64,
    clock: Arc<dyn Clock>,
}

impl SymbolResolver {
    pub fn new(cache: Arc<dyn MappingCacheStore>, feed: Arc<dyn PriceFeedProvider>) -> Self {
        Self {
            cache,
            feed,
            identifiers: Arc::new(NoopIdentifierMapper),
            limits: ConcurrencyLimits::default(),
            retry: RetryPolicy::default(),
            min_similarity: 0.7,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_identifier_provider(mut self, identifiers: Arc<dyn IdentifierMappingProvider>) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn with_limits(mut self, limits: ConcurrencyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn resolve(&self, security: &Security) -> Resolution {
        if let Some(symbol) = security.canonical_symbol.as_deref().map(normalize_symbol) {
            if !symbol.is_empty() {
                return Resolution::resolved(symbol, 100, ResolutionMethod::Provided);
            }
        }

        match self.cache.get(&security.provider_id).await {
            Ok(Some(mapping)) => return mapping.resolution(),
            Ok(None) => {}
            Err(err) => warn!(
                provider_id = %security.provider_id,
                error = %err,
                "symbol mapping cache read failed"
            ),
        }

        let resolution = self.resolve_uncached(security).await;
        self.remember(security, &resolution).await;
        resolution
    }

    /// Resolve many securities with bounded concurrency. Keyed by provider id;
    /// duplicates are resolved once.
    pub async fn resolve_all(&self, securities: &[Security]) -> BTreeMap<String, Resolution> {
        let unique: BTreeMap<&str, &Security> = securities
            .iter()
            .map(|s| (s.provider_id.as_str(), s))
            .collect();

        let gate = Arc::new(Semaphore::new(self.limits.max_concurrent_symbol_lookups.max(1)));
        let results = join_all(unique.into_values().map(|security| {
            let gate = gate.clone();
            async move {
                let _permit = gate.acquire_owned().await;
                (security.provider_id.clone(), self.resolve(security).await)
            }
        }))
        .await;

        let resolved: BTreeMap<String, Resolution> = results.into_iter().collect();
        let unresolved = resolved.values().filter(|r| !r.is_resolved()).count();
        debug!(total = resolved.len(), unresolved, "resolved securities");
        resolved
    }

    async fn resolve_uncached(&self, security: &Security) -> Resolution {
        if let Some(resolution) = self.try_direct_ticker(security).await {
            return resolution;
        }
        if let Some(resolution) = self.try_identifier(security).await {
            return resolution;
        }
        if let Some(resolution) = self.try_fuzzy_name(security).await {
            return resolution;
        }
        Resolution::unresolved()
    }

    async fn try_direct_ticker(&self, security: &Security) -> Option<Resolution> {
        let ticker = security
            .ticker
            .as_deref()
            .map(normalize_symbol)
            .filter(|t| !t.is_empty())?;

        let operation = format!("{} validate {ticker}", self.feed.name());
        match self
            .retry
            .run(&operation, || self.feed.validate_symbol(&ticker))
            .await
        {
            Ok(true) => Some(Resolution::resolved(ticker, 100, ResolutionMethod::DirectTicker)),
            Ok(false) => {
                debug!(ticker = %ticker, "ticker not in symbol directory");
                None
            }
            Err(err) => {
                warn!(ticker = %ticker, error = %err, "ticker validation failed");
                None
            }
        }
    }

    /// CUSIP first, then ISIN.
    async fn try_identifier(&self, security: &Security) -> Option<Resolution> {
        let identifiers = [
            (IdentifierType::Cusip, security.cusip.as_deref()),
            (IdentifierType::Isin, security.isin.as_deref()),
        ];
        for (id_type, value) in identifiers {
            let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            if let Some(resolution) = self.lookup_identifier(id_type, value).await {
                return Some(resolution);
            }
        }
        None
    }

    async fn lookup_identifier(&self, id_type: IdentifierType, value: &str) -> Option<Resolution> {
        let operation = format!("{} lookup {value}", self.identifiers.name());
        match self
            .retry
            .run(&operation, || self.identifiers.lookup(id_type, value))
            .await
        {
            Ok(Some(ticker)) => Some(Resolution::resolved(
                normalize_symbol(&ticker),
                IDENTIFIER_CONFIDENCE,
                ResolutionMethod::IdentifierLookup,
            )),
            Ok(None) => None,
            Err(err) => {
                warn!(id_type = ?id_type, value, error = %err, "identifier lookup failed");
                None
            }
        }
    }

    async fn try_fuzzy_name(&self, security: &Security) -> Option<Resolution> {
        let name = security
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())?;
        let ticker_hint = security
            .ticker
            .as_deref()
            .map(normalize_symbol)
            .filter(|t| !t.is_empty());

        let operation = format!("{} search {name}", self.feed.name());
        let matches = match self
            .retry
            .run(&operation, || self.feed.search_by_name(name))
            .await
        {
            Ok(matches) => matches,
            Err(err) => {
                warn!(name, error = %err, "symbol search failed");
                return None;
            }
        };

        let mut best: Option<(f64, String)> = None;
        for candidate in matches {
            let mut score = name_similarity(name, &candidate.name);
            if let Some(ticker) = &ticker_hint {
                if normalize_symbol(&candidate.symbol).contains(ticker.as_str()) {
                    score += TICKER_SUBSTRING_BONUS;
                }
            }
            let score = score.min(1.0);
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, candidate.symbol));
            }
        }

        let (score, symbol) = best?;
        if score < self.min_similarity {
            debug!(name, score, "best name match below threshold");
            return None;
        }
        Some(Resolution::resolved(
            normalize_symbol(&symbol),
            (score * 100.0).round() as u8,
            ResolutionMethod::FuzzyName,
        ))
    }

    async fn remember(&self, security: &Security, resolution: &Resolution) {
        let now = self.clock.now();
        match &resolution.symbol {
            Some(symbol) => {
                let mapping = SymbolMapping {
                    provider_id: security.provider_id.clone(),
                    symbol: symbol.clone(),
                    confidence: resolution.confidence,
                    method: resolution.method,
                    resolved_at: now,
                };
                info!(
                    provider_id = %security.provider_id,
                    symbol = %symbol,
                    method = ?resolution.method,
                    confidence = resolution.confidence,
                    "resolved security"
                );
                if let Err(err) = self.cache.upsert(&mapping).await {
                    warn!(provider_id = %security.provider_id, error = %err, "failed to cache symbol mapping");
                }
            }
            None => {
                warn!(
                    provider_id = %security.provider_id,
                    name = security.display_name(),
                    "security could not be resolved, excluded from valuation"
                );
                let entry = UnresolvedSecurity::from_security(security, now);
                if let Err(err) = self.cache.record_unresolved(entry).await {
                    warn!(provider_id = %security.provider_id, error = %err, "failed to queue unresolved security");
                }
            }
        }
    }
}
