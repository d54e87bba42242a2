use rust_decimal::Decimal;
use serde::Serialize;

use super::{
    allocation, diversification_score, risk_score, AllocationSlice, DiversificationLevel,
    PortfolioPosition, RiskLevel,
};

/// Scores plus allocation, ready for display or an agent tool response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioScores {
    pub risk_score: Decimal,
    pub risk_level: RiskLevel,
    pub diversification_score: Decimal,
    pub diversification_level: DiversificationLevel,
    pub total_value: Decimal,
    pub position_count: usize,
    pub allocation: Vec<AllocationSlice>,
    pub summary: String,
}

pub fn score_portfolio(positions: &[PortfolioPosition]) -> PortfolioScores {
    let risk = risk_score(positions);
    let diversification = diversification_score(positions);
    let allocation = allocation(positions);
    let total_value: Decimal = allocation.iter().map(|s| s.market_value).sum();
    let position_count = allocation.iter().map(|s| s.positions).sum();

    let mut scores = PortfolioScores {
        risk_score: risk,
        risk_level: RiskLevel::from_score(risk),
        diversification_score: diversification,
        diversification_level: DiversificationLevel::from_score(diversification),
        total_value,
        position_count,
        allocation,
        summary: String::new(),
    };
    scores.summary = describe(&scores);
    scores
}

fn describe(scores: &PortfolioScores) -> String {
    if scores.position_count == 0 {
        return "No positions with value to score.".to_string();
    }
    let positions = plural(scores.position_count, "position");
    let classes = plural(scores.allocation.len(), "asset class");
    let mut text = format!(
        "Risk {}/10 ({}), diversification {}/10 ({}) across {positions} in {classes}.",
        scores.risk_score.normalize(),
        scores.risk_level.as_str(),
        scores.diversification_score.normalize(),
        scores.diversification_level.as_str(),
    );
    if let Some(largest) = scores.allocation.first() {
        text.push_str(&format!(
            " Largest allocation: {} at {}%.",
            largest.asset_class.as_str(),
            largest.weight_percent.normalize()
        ));
    }
    text
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else if noun.ends_with("ss") {
        format!("{n} {noun}es")
    } else {
        format!("{n} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SecurityType;
    use rust_decimal_macros::dec;

    #[test]
    fn summary_names_levels_and_largest_class() {
        let scores = score_portfolio(&[
            PortfolioPosition::new("AAPL", SecurityType::Equity, dec!(6000)),
            PortfolioPosition::new("BND", SecurityType::Bond, dec!(4000)),
        ]);
        assert_eq!(scores.position_count, 2);
        assert_eq!(scores.total_value, dec!(10000));
        assert!(scores.summary.contains("across 2 positions in 2 asset classes"));
        assert!(scores.summary.contains("Largest allocation: equity at 60%"));
        assert!(scores.summary.contains(scores.risk_level.as_str()));
    }

    #[test]
    fn empty_portfolio_summary() {
        let scores = score_portfolio(&[]);
        assert_eq!(scores.risk_score, Decimal::ZERO);
        assert_eq!(scores.diversification_score, Decimal::ZERO);
        assert_eq!(scores.summary, "No positions with value to score.");
    }
}
