// src/portfolio/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Id, SecurityType};

/// Reconstructed (estimated from transactions and prices) vs. captured from
/// live broker data at the end of the day. A capture wins over a
/// reconstruction for the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    Reconstructed,
    DailyEod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// A market close on the date or within the lookback window.
    Market,
    /// Cash, valued at 1.
    Par,
    /// Last-known value from the live holdings feed.
    Fallback,
    /// Nothing to value the position with.
    Missing,
}

impl PriceSource {
    pub fn is_priced(self) -> bool {
        matches!(self, PriceSource::Market | PriceSource::Par)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityValuation {
    pub account_id: Id,
    pub security_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default)]
    pub security_type: SecurityType,
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_date: Option<NaiveDate>,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub price_source: PriceSource,
}

/// One account's share of a user-level snapshot, stored with the snapshot so
/// account charts use the value actually held that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBreakdown {
    pub account_id: Id,
    pub securities_value: Decimal,
    /// `None` when cash for that date is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_value: Option<Decimal>,
    pub total_value: Decimal,
    #[serde(default)]
    pub cost_basis: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// User id for user-level snapshots, account id for account-level ones.
    pub entity_id: Id,
    pub date: NaiveDate,
    pub snapshot_type: SnapshotType,
    /// Securities plus recorded cash.
    pub total_value: Decimal,
    pub securities_value: Decimal,
    pub cash_value: Option<Decimal>,
    pub total_cost_basis: Decimal,
    pub total_gain_loss: Decimal,
    pub total_gain_loss_percent: Decimal,
    pub securities: Vec<SecurityValuation>,
    pub accounts: Vec<AccountBreakdown>,
    pub securities_count: usize,
    /// Share of held securities valued from a real price, 0–100.
    pub data_quality_score: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn key(&self) -> (Id, NaiveDate, SnapshotType) {
        (self.entity_id.clone(), self.date, self.snapshot_type)
    }

    pub fn account(&self, account_id: &Id) -> Option<&AccountBreakdown> {
        self.accounts.iter().find(|a| &a.account_id == account_id)
    }

    /// Assemble a snapshot from valued positions and per-account totals,
    /// deriving every total from the parts.
    pub fn from_parts(
        entity_id: Id,
        date: NaiveDate,
        snapshot_type: SnapshotType,
        securities: Vec<SecurityValuation>,
        accounts: Vec<AccountBreakdown>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let securities_value: Decimal = securities.iter().map(|s| s.market_value).sum();
        let total_cost_basis: Decimal = securities.iter().map(|s| s.cost_basis).sum();

        let recorded_cash: Vec<Decimal> = accounts.iter().filter_map(|a| a.cash_value).collect();
        let cash_value = (!recorded_cash.is_empty()).then(|| recorded_cash.iter().copied().sum());

        let total_gain_loss = securities_value - total_cost_basis;
        let total_gain_loss_percent = if total_cost_basis.is_zero() {
            Decimal::ZERO
        } else {
            (total_gain_loss / total_cost_basis * Decimal::ONE_HUNDRED).round_dp(2)
        };

        let priced = securities.iter().filter(|s| s.price_source.is_priced()).count();
        let data_quality_score = if securities.is_empty() {
            Decimal::ONE_HUNDRED
        } else {
            (Decimal::from(priced) / Decimal::from(securities.len()) * Decimal::ONE_HUNDRED)
                .round_dp(2)
        };

        Self {
            entity_id,
            date,
            snapshot_type,
            total_value: securities_value + cash_value.unwrap_or(Decimal::ZERO),
            securities_value,
            cash_value,
            total_cost_basis,
            total_gain_loss,
            total_gain_loss_percent,
            securities_count: securities.len(),
            securities,
            accounts,
            data_quality_score,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valuation(account: &str, value: Decimal, cost: Decimal, source: PriceSource) -> SecurityValuation {
        SecurityValuation {
            account_id: Id::from(account),
            security_id: "VTI".to_string(),
            symbol: Some("VTI".to_string()),
            security_type: SecurityType::Etf,
            quantity: dec!(1),
            price: Some(value),
            price_date: None,
            market_value: value,
            cost_basis: cost,
            price_source: source,
        }
    }

    #[test]
    fn totals_are_derived_from_parts() {
        let snapshot = PortfolioSnapshot::from_parts(
            Id::from("user"),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            SnapshotType::DailyEod,
            vec![
                valuation("a", dec!(300), dec!(200), PriceSource::Market),
                valuation("b", dec!(100), dec!(200), PriceSource::Fallback),
            ],
            vec![AccountBreakdown {
                account_id: Id::from("a"),
                securities_value: dec!(300),
                cash_value: Some(dec!(50)),
                total_value: dec!(350),
                cost_basis: dec!(200),
            }],
            Utc::now(),
        );

        assert_eq!(snapshot.securities_value, dec!(400));
        assert_eq!(snapshot.total_value, dec!(450));
        assert_eq!(snapshot.total_gain_loss, dec!(0));
        assert_eq!(snapshot.data_quality_score, dec!(50));
        assert_eq!(snapshot.securities_count, 2);
    }

    #[test]
    fn zero_cost_basis_gives_zero_percent() {
        let snapshot = PortfolioSnapshot::from_parts(
            Id::from("user"),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            SnapshotType::Reconstructed,
            vec![valuation("a", dec!(300), dec!(0), PriceSource::Market)],
            Vec::new(),
            Utc::now(),
        );
        assert_eq!(snapshot.total_gain_loss_percent, dec!(0));
        assert_eq!(snapshot.cash_value, None);
        assert_eq!(snapshot.total_value, dec!(300));
    }
}
