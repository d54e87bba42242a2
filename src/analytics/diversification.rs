use std::collections::BTreeSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::models::{clamp_score, herfindahl, weighted};
use super::PortfolioPosition;

const COUNT_WEIGHT: Decimal = dec!(0.30);
const CLASS_WEIGHT: Decimal = dec!(0.35);
const EVENNESS_WEIGHT: Decimal = dec!(0.35);

/// Diversification on a 0 to 10 scale.
///
/// Blends three sub-scores, each 0 to 10: the number of positions and the
/// number of asset classes (both `10 * (1 - 1/n)`), and the evenness of the
/// weights (`10 * (1 - HHI)`). No positions score 0.
pub fn diversification_score(positions: &[PortfolioPosition]) -> Decimal {
    let weights = weighted(positions);
    if weights.is_empty() {
        return Decimal::ZERO;
    }

    let classes: BTreeSet<_> = weights.iter().map(|(p, _)| p.class()).collect();
    let count = breadth(weights.len());
    let class = breadth(classes.len());
    let evenness = Decimal::TEN * (Decimal::ONE - herfindahl(&weights));

    clamp_score(COUNT_WEIGHT * count + CLASS_WEIGHT * class + EVENNESS_WEIGHT * evenness)
}

fn breadth(n: usize) -> Decimal {
    Decimal::TEN * (Decimal::ONE - Decimal::ONE / Decimal::from(n.max(1)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversificationLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl DiversificationLevel {
    pub fn from_score(score: Decimal) -> Self {
        if score < dec!(3) {
            DiversificationLevel::Poor
        } else if score < dec!(6) {
            DiversificationLevel::Fair
        } else if score < dec!(8) {
            DiversificationLevel::Good
        } else {
            DiversificationLevel::Excellent
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiversificationLevel::Poor => "poor",
            DiversificationLevel::Fair => "fair",
            DiversificationLevel::Good => "good",
            DiversificationLevel::Excellent => "excellent",
        }
    }
}
