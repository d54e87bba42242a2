use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::models::{clamp_score, herfindahl, weighted};
use super::{AssetClass, PortfolioPosition};
use crate::models::SecurityType;

/// Share of the remaining headroom added for a fully concentrated portfolio.
const CONCENTRATION_FACTOR: Decimal = dec!(0.25);

/// Risk weight (0 to 10) of one instrument.
pub fn risk_weight(asset_class: AssetClass, security_type: SecurityType) -> Decimal {
    match (asset_class, security_type) {
        (_, SecurityType::Option | SecurityType::LeveragedEtf) => dec!(9.5),
        (AssetClass::Cash, _) | (_, SecurityType::Cash | SecurityType::MoneyMarket) => dec!(0.5),
        (AssetClass::Crypto, _) | (_, SecurityType::Crypto) => dec!(9.0),
        (AssetClass::Alternative, _) => dec!(8.5),
        (AssetClass::FixedIncome, _) => dec!(2.5),
        (AssetClass::Commodity, _) | (_, SecurityType::SectorEtf) => dec!(6.5),
        (AssetClass::RealEstate, _) => dec!(5.0),
        (AssetClass::Equity, SecurityType::Etf | SecurityType::MutualFund) => dec!(3.5),
        (AssetClass::Equity, _) => dec!(6.0),
        (AssetClass::Other, _) => dec!(5.0),
    }
}

/// Portfolio risk on a 0 to 10 scale.
///
/// The value-weighted average of position risk weights, pushed towards 10 in
/// proportion to the Herfindahl concentration of the weights. The push is
/// scaled by the base itself, so concentrating in low-risk holdings adds
/// little. No positions score 0.
pub fn risk_score(positions: &[PortfolioPosition]) -> Decimal {
    let weights = weighted(positions);
    if weights.is_empty() {
        return Decimal::ZERO;
    }
    let base: Decimal = weights
        .iter()
        .map(|(p, w)| risk_weight(p.class(), p.security_type) * w)
        .sum();
    let concentration = herfindahl(&weights);
    let push = (Decimal::TEN - base) * CONCENTRATION_FACTOR * concentration * base / Decimal::TEN;
    clamp_score(base + push)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn from_score(score: Decimal) -> Self {
        if score < dec!(3.5) {
            RiskLevel::Low
        } else if score < dec!(6.5) {
            RiskLevel::Moderate
        } else if score < dec!(8.5) {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very high",
        }
    }
}
