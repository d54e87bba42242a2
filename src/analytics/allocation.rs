use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AssetClass, PortfolioPosition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub asset_class: AssetClass,
    pub market_value: Decimal,
    /// Share of the total, 0 to 100, two decimals.
    pub weight_percent: Decimal,
    pub positions: usize,
}

/// Value per asset class, largest first. Positions without value are left out.
pub fn allocation(positions: &[PortfolioPosition]) -> Vec<AllocationSlice> {
    let mut by_class: BTreeMap<AssetClass, (Decimal, usize)> = BTreeMap::new();
    for position in positions.iter().filter(|p| p.market_value > Decimal::ZERO) {
        let entry = by_class.entry(position.class()).or_default();
        entry.0 += position.market_value;
        entry.1 += 1;
    }
    let total: Decimal = by_class.values().map(|(value, _)| *value).sum();
    if total.is_zero() {
        return Vec::new();
    }

    let mut slices: Vec<AllocationSlice> = by_class
        .into_iter()
        .map(|(asset_class, (market_value, positions))| AllocationSlice {
            asset_class,
            market_value,
            weight_percent: (market_value / total * Decimal::ONE_HUNDRED).round_dp(2),
            positions,
        })
        .collect();
    slices.sort_by(|a, b| {
        b.market_value
            .cmp(&a.market_value)
            .then(a.asset_class.cmp(&b.asset_class))
    });
    slices
}
