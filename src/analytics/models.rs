use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::SecurityType;
use crate::portfolio::SecurityValuation;

/// Broad asset class used for allocation and diversification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    FixedIncome,
    Cash,
    RealEstate,
    Commodity,
    Crypto,
    Alternative,
    Other,
}

impl AssetClass {
    /// Class implied by the instrument type when nothing better is known.
    pub fn default_for(security_type: SecurityType) -> Self {
        match security_type {
            SecurityType::Equity
            | SecurityType::Etf
            | SecurityType::SectorEtf
            | SecurityType::LeveragedEtf
            | SecurityType::MutualFund => AssetClass::Equity,
            SecurityType::Bond => AssetClass::FixedIncome,
            SecurityType::MoneyMarket | SecurityType::Cash => AssetClass::Cash,
            SecurityType::Crypto => AssetClass::Crypto,
            SecurityType::Option => AssetClass::Alternative,
            SecurityType::Other => AssetClass::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetClass::Equity => "equity",
            AssetClass::FixedIncome => "fixed income",
            AssetClass::Cash => "cash",
            AssetClass::RealEstate => "real estate",
            AssetClass::Commodity => "commodity",
            AssetClass::Crypto => "crypto",
            AssetClass::Alternative => "alternative",
            AssetClass::Other => "other",
        }
    }
}

/// One holding as seen by the scoring functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub symbol: String,
    #[serde(default)]
    pub security_type: SecurityType,
    /// Overrides the class implied by `security_type`, e.g. a bond ETF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<AssetClass>,
    pub market_value: Decimal,
}

impl PortfolioPosition {
    pub fn new(symbol: impl Into<String>, security_type: SecurityType, market_value: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            security_type,
            asset_class: None,
            market_value,
        }
    }

    pub fn with_asset_class(mut self, asset_class: AssetClass) -> Self {
        self.asset_class = Some(asset_class);
        self
    }

    pub fn from_valuation(valuation: &SecurityValuation) -> Self {
        Self::new(
            valuation
                .symbol
                .clone()
                .unwrap_or_else(|| valuation.security_id.clone()),
            valuation.security_type,
            valuation.market_value,
        )
    }

    pub fn class(&self) -> AssetClass {
        self.asset_class
            .unwrap_or_else(|| AssetClass::default_for(self.security_type))
    }
}

/// Positions with a positive value and their share of the total, in input
/// order. Empty when nothing has value.
pub(crate) fn weighted(positions: &[PortfolioPosition]) -> Vec<(&PortfolioPosition, Decimal)> {
    let valued: Vec<&PortfolioPosition> = positions
        .iter()
        .filter(|p| p.market_value > Decimal::ZERO)
        .collect();
    let total: Decimal = valued.iter().map(|p| p.market_value).sum();
    if total.is_zero() {
        return Vec::new();
    }
    valued
        .into_iter()
        .map(|p| (p, p.market_value / total))
        .collect()
}

/// Herfindahl index of the weights: 1 for a single position, 1/n for n equal ones.
pub(crate) fn herfindahl(weights: &[(&PortfolioPosition, Decimal)]) -> Decimal {
    weights.iter().map(|(_, w)| w * w).sum()
}

pub(crate) fn clamp_score(score: Decimal) -> Decimal {
    score
        .max(Decimal::ZERO)
        .min(Decimal::TEN)
        .round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn explicit_class_overrides_security_type() {
        let bond_etf = PortfolioPosition::new("BND", SecurityType::Etf, dec!(100))
            .with_asset_class(AssetClass::FixedIncome);
        assert_eq!(bond_etf.class(), AssetClass::FixedIncome);
        assert_eq!(
            PortfolioPosition::new("VTI", SecurityType::Etf, dec!(100)).class(),
            AssetClass::Equity
        );
    }

    #[test]
    fn weights_ignore_worthless_positions() {
        let positions = vec![
            PortfolioPosition::new("A", SecurityType::Equity, dec!(75)),
            PortfolioPosition::new("B", SecurityType::Equity, dec!(25)),
            PortfolioPosition::new("C", SecurityType::Equity, dec!(0)),
        ];
        let weights = weighted(&positions);
        assert_eq!(weights.len(), 2);
        assert_eq!(weights[0].1, dec!(0.75));
        assert_eq!(herfindahl(&weights), dec!(0.625));
    }

    #[test]
    fn positions_deserialize_with_defaults() {
        let position: PortfolioPosition =
            serde_json::from_str(r#"{"symbol":"AAPL","market_value":"1000"}"#).unwrap();
        assert_eq!(position.security_type, SecurityType::Equity);
        assert_eq!(position.class(), AssetClass::Equity);
        assert_eq!(position.market_value, dec!(1000));
    }
}
