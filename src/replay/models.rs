use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Outcome;
use crate::models::{Id, Transaction, TransactionType};

/// How events that share an effective date are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameDayOrder {
    /// The order the provider returned them in.
    #[default]
    Provider,
    /// By execution timestamp; events without one keep provider order and go
    /// after timestamped ones.
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Days from trade date to the date holdings change.
    pub settlement_lag_days: u32,
    pub same_day_order: SameDayOrder,
    /// Inclusive `[start, end]`. Without one the replay spans the first to the
    /// last effective date.
    pub window: Option<(NaiveDate, NaiveDate)>,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            settlement_lag_days: 1,
            same_day_order: SameDayOrder::default(),
            window: None,
        }
    }
}

impl ReplayOptions {
    pub fn with_window(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.window = Some((start, end));
        self
    }

    pub fn with_settlement_lag(mut self, days: u32) -> Self {
        self.settlement_lag_days = days;
        self
    }

    pub fn with_same_day_order(mut self, order: SameDayOrder) -> Self {
        self.same_day_order = order;
        self
    }

    pub fn effective_date(&self, tx: &Transaction) -> NaiveDate {
        tx.trade_date + chrono::Duration::days(i64::from(self.settlement_lag_days))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub quantity: Decimal,
    pub cost_basis: Decimal,
}

impl Position {
    pub fn new(quantity: Decimal, cost_basis: Decimal) -> Self {
        Self {
            quantity,
            cost_basis,
        }
    }

    pub fn average_cost(&self) -> Option<Decimal> {
        (!self.quantity.is_zero()).then(|| self.cost_basis / self.quantity)
    }
}

/// Mutable per-security aggregate owned by one replay run.
///
/// Quantities never go below zero; positions that reach zero are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionBook {
    positions: BTreeMap<String, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: BTreeMap<String, Position>) -> Self {
        Self {
            positions: positions
                .into_iter()
                .filter(|(_, p)| p.quantity > Decimal::ZERO)
                .collect(),
        }
    }

    pub fn get(&self, security_id: &str) -> Option<&Position> {
        self.positions.get(security_id)
    }

    pub fn quantity(&self, security_id: &str) -> Decimal {
        self.get(security_id).map_or(Decimal::ZERO, |p| p.quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn into_positions(self) -> BTreeMap<String, Position> {
        self.positions
    }

    pub fn state_on(&self, date: NaiveDate) -> HoldingState {
        HoldingState {
            date,
            positions: self.positions.clone(),
        }
    }

    /// Apply one event forward in time.
    ///
    /// An oversell is capped at the available quantity (`Degraded`); a sell
    /// against no position is a no-op (`Skipped`).
    pub fn apply(&mut self, tx: &Transaction) -> Outcome<()> {
        let quantity = tx.quantity.abs();
        match tx.kind {
            TransactionType::Buy => {
                let position = self.positions.entry(tx.security_id.clone()).or_default();
                position.quantity += quantity;
                position.cost_basis += tx.purchase_cost();
                if position.quantity.is_zero() {
                    self.positions.remove(&tx.security_id);
                }
                Outcome::Ok(())
            }
            TransactionType::Sell => {
                let Some(position) = self.positions.get_mut(&tx.security_id) else {
                    return Outcome::Skipped(format!(
                        "sell of {quantity} {} with no position",
                        tx.security_id
                    ));
                };
                if quantity > position.quantity {
                    let available = position.quantity;
                    self.positions.remove(&tx.security_id);
                    return Outcome::Degraded(
                        (),
                        format!(
                            "sell of {quantity} {} exceeds held {available}, capped",
                            tx.security_id
                        ),
                    );
                }
                position.cost_basis *= Decimal::ONE - quantity / position.quantity;
                position.quantity -= quantity;
                if position.quantity.is_zero() {
                    self.positions.remove(&tx.security_id);
                }
                Outcome::Ok(())
            }
            TransactionType::Dividend | TransactionType::Other => Outcome::Ok(()),
        }
    }

    /// Undo one event, walking backwards from a later state.
    ///
    /// A buy removes its quantity and cost (floored at zero); a sell adds the
    /// quantity back at the position's average cost, or at the trade price
    /// when nothing is left to average.
    pub fn unapply(&mut self, tx: &Transaction) -> Outcome<()> {
        let quantity = tx.quantity.abs();
        match tx.kind {
            TransactionType::Buy => {
                let Some(position) = self.positions.get_mut(&tx.security_id) else {
                    return Outcome::Skipped(format!(
                        "buy of {quantity} {} not reflected in current holdings",
                        tx.security_id
                    ));
                };
                let held = position.quantity;
                position.quantity = (position.quantity - quantity).max(Decimal::ZERO);
                position.cost_basis = (position.cost_basis - tx.purchase_cost()).max(Decimal::ZERO);
                if position.quantity.is_zero() {
                    self.positions.remove(&tx.security_id);
                }
                if quantity > held {
                    return Outcome::Degraded(
                        (),
                        format!(
                            "buy of {quantity} {} exceeds current {held}, floored at zero",
                            tx.security_id
                        ),
                    );
                }
                Outcome::Ok(())
            }
            TransactionType::Sell => {
                let position = self.positions.entry(tx.security_id.clone()).or_default();
                let unit_cost = position.average_cost().unwrap_or(tx.price);
                position.cost_basis += unit_cost * quantity;
                position.quantity += quantity;
                if position.quantity.is_zero() {
                    self.positions.remove(&tx.security_id);
                }
                Outcome::Ok(())
            }
            TransactionType::Dividend | TransactionType::Other => Outcome::Ok(()),
        }
    }
}

/// Holdings as of the end of one date. Only positive quantities appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingState {
    pub date: NaiveDate,
    pub positions: BTreeMap<String, Position>,
}

impl HoldingState {
    pub fn quantity(&self, security_id: &str) -> Decimal {
        self.positions
            .get(security_id)
            .map_or(Decimal::ZERO, |p| p.quantity)
    }

    pub fn total_cost_basis(&self) -> Decimal {
        self.positions.values().map(|p| p.cost_basis).sum()
    }
}

/// A data-inconsistency signal from replay. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayWarning {
    pub date: NaiveDate,
    pub transaction_id: Id,
    pub security_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayResult {
    pub states: Vec<HoldingState>,
    pub warnings: Vec<ReplayWarning>,
}

impl ReplayResult {
    pub fn state_on(&self, date: NaiveDate) -> Option<&HoldingState> {
        self.states
            .binary_search_by_key(&date, |s| s.date)
            .ok()
            .map(|i| &self.states[i])
    }
}
