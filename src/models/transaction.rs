use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Buy,
    Sell,
    Dividend,
    #[serde(other)]
    Other,
}

/// An immutable brokerage event. Quantities are unsigned; direction comes from
/// `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Id,
    pub account_id: Id,
    pub trade_date: NaiveDate,
    /// Execution time when the provider reports one. Only used for same-day
    /// ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Provider identifier of the security (matches `Security::provider_id`).
    pub security_id: String,
    pub kind: TransactionType,
    pub quantity: Decimal,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub net_amount: Decimal,
    #[serde(default)]
    pub fees: Decimal,
}

impl Transaction {
    pub fn new(
        account_id: impl Into<Id>,
        trade_date: NaiveDate,
        security_id: impl Into<String>,
        kind: TransactionType,
        quantity: Decimal,
    ) -> Self {
        Self {
            id: Id::new(),
            account_id: account_id.into(),
            trade_date,
            timestamp: None,
            security_id: security_id.into(),
            kind,
            quantity: quantity.abs(),
            price: Decimal::ZERO,
            net_amount: Decimal::ZERO,
            fees: Decimal::ZERO,
        }
    }

    pub fn buy(
        account_id: impl Into<Id>,
        trade_date: NaiveDate,
        security_id: impl Into<String>,
        quantity: Decimal,
        net_amount: Decimal,
    ) -> Self {
        Self::new(account_id, trade_date, security_id, TransactionType::Buy, quantity)
            .with_net_amount(net_amount)
    }

    pub fn sell(
        account_id: impl Into<Id>,
        trade_date: NaiveDate,
        security_id: impl Into<String>,
        quantity: Decimal,
        net_amount: Decimal,
    ) -> Self {
        Self::new(account_id, trade_date, security_id, TransactionType::Sell, quantity)
            .with_net_amount(net_amount)
    }

    pub fn with_id(mut self, id: impl Into<Id>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    pub fn with_net_amount(mut self, net_amount: Decimal) -> Self {
        self.net_amount = net_amount;
        self
    }

    pub fn with_fees(mut self, fees: Decimal) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Cash paid for a buy: `|net_amount|`, or `quantity × price + fees` when
    /// the provider left the net amount empty.
    pub fn purchase_cost(&self) -> Decimal {
        if self.net_amount.is_zero() {
            self.quantity * self.price + self.fees
        } else {
            self.net_amount.abs()
        }
    }
}
