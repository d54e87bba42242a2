use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Id, Security};

/// A brokerage or bank account owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    /// Aggregator the account was linked through (alpaca, plaid, snaptrade...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Account {
    pub fn new(id: impl Into<Id>, user_id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// A position as reported right now by the live holdings feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentHolding {
    pub account_id: Id,
    pub security: Security,
    pub quantity: Decimal,
    #[serde(default)]
    pub cost_basis: Decimal,
    #[serde(default)]
    pub market_value: Decimal,
}

impl CurrentHolding {
    pub fn new(
        account_id: impl Into<Id>,
        security: Security,
        quantity: Decimal,
        cost_basis: Decimal,
        market_value: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            security,
            quantity,
            cost_basis,
            market_value,
        }
    }
}
