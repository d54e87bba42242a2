pub(crate) mod files;
mod json_file;
mod lookup;
mod memory;

pub use json_file::JsonFileBrokerData;
pub use lookup::{find_account, require_accounts};
pub use memory::MemoryBrokerData;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{Account, CurrentHolding, Id, Transaction};

/// Live broker view of a user's accounts.
#[async_trait::async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// `Ok(None)` for an unknown user; `Ok(Some(vec![]))` for a known user
    /// without linked accounts.
    async fn list_accounts(&self, user_id: &Id) -> Result<Option<Vec<Account>>>;

    /// Current positions across the user's accounts, or one account.
    async fn get_current_holdings(
        &self,
        user_id: &Id,
        account_id: Option<&Id>,
    ) -> Result<Vec<CurrentHolding>>;

    async fn get_cash_balance(&self, user_id: &Id, account_id: Option<&Id>) -> Result<Decimal>;
}

/// Historical brokerage events.
#[async_trait::async_trait]
pub trait TransactionProvider: Send + Sync {
    /// Every transaction for the account (with trade date on or after `since`
    /// when given), ascending by trade date. Implementations backed by a
    /// paginated API drain all pages before returning.
    async fn get_transactions(
        &self,
        account_id: &Id,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>>;
}
