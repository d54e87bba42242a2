use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wealthline::analytics::{
    diversification_score, risk_score, score_portfolio, AssetClass, PortfolioPosition,
};
use wealthline::models::SecurityType;

fn position(symbol: &str, security_type: SecurityType, value: Decimal) -> PortfolioPosition {
    PortfolioPosition::new(symbol, security_type, value)
}

fn etf(symbol: &str, class: AssetClass, value: Decimal) -> PortfolioPosition {
    position(symbol, SecurityType::Etf, value).with_asset_class(class)
}

#[test]
fn risk_rises_from_cash_to_leverage_at_equal_value() {
    let cash = risk_score(&[position("USD", SecurityType::Cash, dec!(10000))]);
    let broad = risk_score(&[position("VTI", SecurityType::Etf, dec!(10000))]);
    let stocks = risk_score(&[
        position("AAPL", SecurityType::Equity, dec!(5000)),
        position("NVDA", SecurityType::Equity, dec!(5000)),
    ]);
    let leveraged = risk_score(&[
        position("TQQQ", SecurityType::LeveragedEtf, dec!(5000)),
        position("SOXL", SecurityType::LeveragedEtf, dec!(5000)),
    ]);

    assert!(cash < broad, "cash {cash} < broad {broad}");
    assert!(broad < stocks, "broad {broad} < stocks {stocks}");
    assert!(stocks < leveraged, "stocks {stocks} < leveraged {leveraged}");
}

#[test]
fn diversification_rises_with_each_new_asset_class() {
    let one = vec![position("AAPL", SecurityType::Equity, dec!(10000))];
    let two = vec![
        position("AAPL", SecurityType::Equity, dec!(10000)),
        etf("BND", AssetClass::FixedIncome, dec!(5000)),
    ];
    let four = vec![
        position("AAPL", SecurityType::Equity, dec!(10000)),
        etf("BND", AssetClass::FixedIncome, dec!(5000)),
        etf("VNQ", AssetClass::RealEstate, dec!(3000)),
        etf("GLD", AssetClass::Commodity, dec!(2000)),
    ];

    let (a, b, c) = (
        diversification_score(&one),
        diversification_score(&two),
        diversification_score(&four),
    );
    assert!(a < b && b < c, "{a} < {b} < {c}");
}

#[test]
fn concentrated_portfolio_is_at_least_as_risky() {
    let concentrated = vec![
        position("AAPL", SecurityType::Equity, dec!(8000)),
        etf("BND", AssetClass::FixedIncome, dec!(2000)),
    ];
    let spread = vec![
        position("AAPL", SecurityType::Equity, dec!(2000)),
        position("MSFT", SecurityType::Equity, dec!(2000)),
        position("GOOG", SecurityType::Equity, dec!(2000)),
        position("AMZN", SecurityType::Equity, dec!(2000)),
        etf("BND", AssetClass::FixedIncome, dec!(1000)),
        etf("AGG", AssetClass::FixedIncome, dec!(1000)),
    ];
    assert!(risk_score(&concentrated) >= risk_score(&spread));
    assert!(diversification_score(&spread) >= diversification_score(&concentrated));
}

#[test]
fn scores_are_bit_identical_across_calls() {
    let positions = vec![
        position("AAPL", SecurityType::Equity, dec!(1234.56)),
        etf("BND", AssetClass::FixedIncome, dec!(789.01)),
        position("BTC", SecurityType::Crypto, dec!(333.33)),
        position("USD", SecurityType::Cash, dec!(50)),
    ];
    let risk = risk_score(&positions);
    let diversification = diversification_score(&positions);
    for _ in 0..5 {
        assert_eq!(risk_score(&positions).serialize(), risk.serialize());
        assert_eq!(diversification_score(&positions).serialize(), diversification.serialize());
    }
}

#[test]
fn empty_input_scores_zero() {
    assert_eq!(risk_score(&[]), Decimal::ZERO);
    assert_eq!(diversification_score(&[]), Decimal::ZERO);
    let scores = score_portfolio(&[]);
    assert!(scores.allocation.is_empty());
    assert_eq!(scores.position_count, 0);
}

#[test]
fn scores_stay_in_range() {
    let positions: Vec<_> = (0..50)
        .map(|i| position(&format!("S{i}"), SecurityType::Option, Decimal::from(1 + i)))
        .collect();
    let risk = risk_score(&positions);
    let diversification = diversification_score(&positions);
    assert!(risk >= Decimal::ZERO && risk <= Decimal::TEN);
    assert!(diversification >= Decimal::ZERO && diversification <= Decimal::TEN);
}
