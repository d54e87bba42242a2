use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use super::{AccountBreakdown, PortfolioSnapshot, PriceSource, SecurityValuation, SnapshotType};
use crate::error::Outcome;
use crate::market_data::PriceTable;
use crate::models::{CurrentHolding, Id, SecurityType};
use crate::replay::HoldingState;

/// Close price for a symbol on a date, allowing an earlier bar.
pub trait PriceLookup: Send + Sync {
    /// `(price date, close)`.
    fn price(&self, symbol: &str, date: NaiveDate) -> Option<(NaiveDate, Decimal)>;
}

/// Lookup over a prefetched [`PriceTable`] with a calendar-day lookback.
pub struct TablePrices<'a> {
    table: &'a PriceTable,
    lookback_days: u32,
}

impl<'a> TablePrices<'a> {
    pub fn new(table: &'a PriceTable, lookback_days: u32) -> Self {
        Self {
            table,
            lookback_days,
        }
    }
}

impl PriceLookup for TablePrices<'_> {
    fn price(&self, symbol: &str, date: NaiveDate) -> Option<(NaiveDate, Decimal)> {
        self.table.close_on_or_before(symbol, date, self.lookback_days)
    }
}

/// What the builder needs to value one security besides its quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityContext {
    pub symbol: Option<String>,
    pub security_type: SecurityType,
    /// Per-unit value from the live holdings feed, used when no price exists.
    pub last_known_price: Option<Decimal>,
}

impl SecurityContext {
    pub fn from_holding(holding: &CurrentHolding, symbol: Option<String>) -> Self {
        let last_known_price = (!holding.quantity.is_zero())
            .then(|| holding.market_value / holding.quantity)
            .filter(|p| *p > Decimal::ZERO);
        Self {
            symbol,
            security_type: holding.security.security_type,
            last_known_price,
        }
    }

    pub fn unpriced(symbol: Option<String>, security_type: SecurityType) -> Self {
        Self {
            symbol,
            security_type,
            last_known_price: None,
        }
    }
}

/// Values holdings states with market prices.
pub struct SnapshotBuilder {
    snapshot_type: SnapshotType,
    created_at: DateTime<Utc>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_type: SnapshotType, created_at: DateTime<Utc>) -> Self {
        Self {
            snapshot_type,
            created_at,
        }
    }

    /// Value one account's holdings on `state.date`.
    ///
    /// Each held security is priced from `prices` (cash at par); without a
    /// price it falls back to the last-known live value and the snapshot comes
    /// back `Degraded`. An empty state is `Skipped`.
    pub fn build(
        &self,
        account_id: &Id,
        state: &HoldingState,
        context: &BTreeMap<String, SecurityContext>,
        prices: &dyn PriceLookup,
    ) -> Outcome<PortfolioSnapshot> {
        let held: Vec<_> = state
            .positions
            .iter()
            .filter(|(_, p)| p.quantity > Decimal::ZERO)
            .collect();
        if held.is_empty() {
            return Outcome::Skipped(format!("nothing held on {}", state.date));
        }

        let mut securities = Vec::with_capacity(held.len());
        let mut substituted = Vec::new();
        for (security_id, position) in held {
            let ctx = context.get(security_id);
            let symbol = ctx.and_then(|c| c.symbol.clone());
            let security_type = ctx.map_or(SecurityType::Other, |c| c.security_type);

            let market = symbol
                .as_deref()
                .and_then(|s| prices.price(s, state.date));
            let (price, price_date, source) = if security_type.is_cash() {
                (Some(Decimal::ONE), Some(state.date), PriceSource::Par)
            } else if let Some((date, close)) = market {
                (Some(close), Some(date), PriceSource::Market)
            } else if let Some(last) = ctx.and_then(|c| c.last_known_price) {
                substituted.push(security_id.clone());
                (Some(last), None, PriceSource::Fallback)
            } else {
                substituted.push(security_id.clone());
                (None, None, PriceSource::Missing)
            };

            if !source.is_priced() {
                warn!(
                    account_id = %account_id,
                    security_id = %security_id,
                    symbol = symbol.as_deref().unwrap_or("-"),
                    date = %state.date,
                    source = ?source,
                    "no market price, using fallback value"
                );
            }

            securities.push(SecurityValuation {
                account_id: account_id.clone(),
                security_id: security_id.clone(),
                symbol,
                security_type,
                quantity: position.quantity,
                price,
                price_date,
                market_value: price.map_or(Decimal::ZERO, |p| p * position.quantity),
                cost_basis: position.cost_basis,
                price_source: source,
            });
        }

        let securities_value: Decimal = securities.iter().map(|s| s.market_value).sum();
        let cost_basis: Decimal = securities.iter().map(|s| s.cost_basis).sum();
        let breakdown = AccountBreakdown {
            account_id: account_id.clone(),
            securities_value,
            cash_value: None,
            total_value: securities_value,
            cost_basis,
        };

        let snapshot = PortfolioSnapshot::from_parts(
            account_id.clone(),
            state.date,
            self.snapshot_type,
            securities,
            vec![breakdown],
            self.created_at,
        );

        if substituted.is_empty() {
            Outcome::Ok(snapshot)
        } else {
            Outcome::Degraded(
                snapshot,
                format!("no price for {}", substituted.join(", ")),
            )
        }
    }

    /// Fold account-level snapshots for one date into a user-level snapshot
    /// with a per-account breakdown.
    pub fn aggregate(
        &self,
        user_id: &Id,
        date: NaiveDate,
        parts: Vec<PortfolioSnapshot>,
    ) -> PortfolioSnapshot {
        let mut securities = Vec::new();
        let mut accounts = Vec::new();
        for part in parts {
            securities.extend(part.securities);
            accounts.extend(part.accounts);
        }
        PortfolioSnapshot::from_parts(
            user_id.clone(),
            date,
            self.snapshot_type,
            securities,
            accounts,
            self.created_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::Position;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn state(d: u32, positions: &[(&str, Decimal, Decimal)]) -> HoldingState {
        HoldingState {
            date: date(d),
            positions: positions
                .iter()
                .map(|(id, q, c)| (id.to_string(), Position::new(*q, *c)))
                .collect(),
        }
    }

    fn context() -> BTreeMap<String, SecurityContext> {
        BTreeMap::from([
            (
                "AAPL".to_string(),
                SecurityContext::unpriced(Some("AAPL".to_string()), SecurityType::Equity),
            ),
            (
                "sec-mmf".to_string(),
                SecurityContext::unpriced(None, SecurityType::Cash),
            ),
            (
                "sec-private".to_string(),
                SecurityContext {
                    symbol: None,
                    security_type: SecurityType::Other,
                    last_known_price: Some(dec!(12)),
                },
            ),
        ])
    }

    fn table() -> PriceTable {
        let mut table = PriceTable::new();
        table.insert("AAPL", date(12), dec!(200));
        table
    }

    #[test]
    fn weekend_uses_prior_close_and_cash_is_par() {
        let builder = SnapshotBuilder::new(SnapshotType::Reconstructed, Utc::now());
        let prices = table();
        let outcome = builder.build(
            &Id::from("acct"),
            &state(14, &[("AAPL", dec!(10), dec!(1900)), ("sec-mmf", dec!(500), dec!(500))]),
            &context(),
            &TablePrices::new(&prices, 5),
        );

        assert!(outcome.is_ok(), "expected a clean snapshot, got {outcome:?}");
        let snapshot = outcome.into_value().unwrap();
        assert_eq!(snapshot.securities_value, dec!(2500));
        assert_eq!(snapshot.total_gain_loss, dec!(100));
        assert_eq!(snapshot.data_quality_score, dec!(100));
        assert_eq!(snapshot.securities[0].price_date, Some(date(12)));
    }

    #[test]
    fn missing_price_falls_back_and_degrades_quality() {
        let builder = SnapshotBuilder::new(SnapshotType::Reconstructed, Utc::now());
        let prices = table();
        let outcome = builder.build(
            &Id::from("acct"),
            &state(12, &[("AAPL", dec!(1), dec!(150)), ("sec-private", dec!(10), dec!(100))]),
            &context(),
            &TablePrices::new(&prices, 5),
        );

        assert!(outcome.is_degraded());
        let snapshot = outcome.into_value().unwrap();
        assert_eq!(snapshot.securities_value, dec!(320));
        assert_eq!(snapshot.data_quality_score, dec!(50));
    }

    #[test]
    fn empty_state_is_skipped() {
        let builder = SnapshotBuilder::new(SnapshotType::Reconstructed, Utc::now());
        let prices = table();
        let outcome = builder.build(
            &Id::from("acct"),
            &state(12, &[]),
            &context(),
            &TablePrices::new(&prices, 5),
        );
        assert!(outcome.is_skipped());
    }

    #[test]
    fn aggregate_keeps_per_account_values() {
        let builder = SnapshotBuilder::new(SnapshotType::Reconstructed, Utc::now());
        let prices = table();
        let lookup = TablePrices::new(&prices, 5);
        let a = builder
            .build(&Id::from("a"), &state(12, &[("AAPL", dec!(3), dec!(500))]), &context(), &lookup)
            .into_value()
            .unwrap();
        let b = builder
            .build(&Id::from("b"), &state(12, &[("AAPL", dec!(2), dec!(300))]), &context(), &lookup)
            .into_value()
            .unwrap();

        let user = builder.aggregate(&Id::from("user"), date(12), vec![a, b]);
        assert_eq!(user.total_value, dec!(1000));
        assert_eq!(user.account(&Id::from("a")).map(|a| a.securities_value), Some(dec!(600)));
        assert_eq!(user.account(&Id::from("b")).map(|a| a.securities_value), Some(dec!(400)));
        assert_eq!(user.securities_count, 2);
    }
}
