use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Account, CurrentHolding, Id, Security, Transaction};

use super::files::{read_json, read_jsonl, write_json, write_jsonl};
use super::{HoldingsProvider, TransactionProvider};

/// JSON file-based broker data, as exported from an aggregator.
///
/// Directory structure:
/// ```text
/// broker/
///   accounts.json              { "<user>": [ { "id", "name", "provider" } ] }
///   holdings/
///     {account}.json           { "cash": "…", "positions": [ … ] }
///   transactions/
///     {account}.jsonl
/// ```
pub struct JsonFileBrokerData {
    base_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRow {
    id: Id,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HoldingsFile {
    #[serde(default)]
    cash: Decimal,
    #[serde(default)]
    positions: Vec<PositionRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PositionRow {
    security: Security,
    quantity: Decimal,
    #[serde(default)]
    cost_basis: Decimal,
    #[serde(default)]
    market_value: Decimal,
}

impl JsonFileBrokerData {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn accounts_file(&self) -> PathBuf {
        self.base_path.join("accounts.json")
    }

    fn holdings_file(&self, account_id: &Id) -> PathBuf {
        self.base_path
            .join("holdings")
            .join(format!("{}.json", account_id.file_stem()))
    }

    fn transactions_file(&self, account_id: &Id) -> PathBuf {
        self.base_path
            .join("transactions")
            .join(format!("{}.jsonl", account_id.file_stem()))
    }

    async fn read_accounts(&self) -> Result<BTreeMap<Id, Vec<AccountRow>>> {
        Ok(read_json(&self.accounts_file()).await?.unwrap_or_default())
    }

    async fn read_holdings(&self, account_id: &Id) -> Result<HoldingsFile> {
        Ok(read_json(&self.holdings_file(account_id))
            .await?
            .unwrap_or_default())
    }

    async fn scoped_accounts(&self, user_id: &Id, account_id: Option<&Id>) -> Result<Vec<Id>> {
        Ok(self
            .list_accounts(user_id)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|a| account_id.map_or(true, |id| &a.id == id))
            .map(|a| a.id)
            .collect())
    }

    /// Register a user's accounts, replacing any previous list.
    pub async fn write_accounts(&self, user_id: &Id, accounts: &[Account]) -> Result<()> {
        let mut all = self.read_accounts().await?;
        all.insert(
            user_id.clone(),
            accounts
                .iter()
                .map(|a| AccountRow {
                    id: a.id.clone(),
                    name: a.name.clone(),
                    provider: a.provider.clone(),
                })
                .collect(),
        );
        write_json(&self.accounts_file(), &all).await
    }

    pub async fn write_holdings(
        &self,
        account_id: &Id,
        cash: Decimal,
        holdings: &[CurrentHolding],
    ) -> Result<()> {
        let file = HoldingsFile {
            cash,
            positions: holdings
                .iter()
                .map(|h| PositionRow {
                    security: h.security.clone(),
                    quantity: h.quantity,
                    cost_basis: h.cost_basis,
                    market_value: h.market_value,
                })
                .collect(),
        };
        write_json(&self.holdings_file(account_id), &file).await
    }

    pub async fn write_transactions(&self, account_id: &Id, txns: &[Transaction]) -> Result<()> {
        write_jsonl(&self.transactions_file(account_id), txns).await
    }
}

#[async_trait::async_trait]
impl HoldingsProvider for JsonFileBrokerData {
    async fn list_accounts(&self, user_id: &Id) -> Result<Option<Vec<Account>>> {
        let mut all = self.read_accounts().await?;
        Ok(all.remove(user_id).map(|rows| {
            rows.into_iter()
                .map(|row| Account {
                    id: row.id,
                    user_id: user_id.clone(),
                    name: row.name,
                    provider: row.provider,
                })
                .collect()
        }))
    }

    async fn get_current_holdings(
        &self,
        user_id: &Id,
        account_id: Option<&Id>,
    ) -> Result<Vec<CurrentHolding>> {
        let mut holdings = Vec::new();
        for account in self.scoped_accounts(user_id, account_id).await? {
            let file = self.read_holdings(&account).await?;
            holdings.extend(file.positions.into_iter().map(|row| CurrentHolding {
                account_id: account.clone(),
                security: row.security,
                quantity: row.quantity,
                cost_basis: row.cost_basis,
                market_value: row.market_value,
            }));
        }
        Ok(holdings)
    }

    async fn get_cash_balance(&self, user_id: &Id, account_id: Option<&Id>) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for account in self.scoped_accounts(user_id, account_id).await? {
            total += self.read_holdings(&account).await?.cash;
        }
        Ok(total)
    }
}

#[async_trait::async_trait]
impl TransactionProvider for JsonFileBrokerData {
    async fn get_transactions(
        &self,
        account_id: &Id,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        let mut txns: Vec<Transaction> =
            read_jsonl(&self.transactions_file(account_id), "transaction").await?;
        // Rows filed under the wrong account are ignored.
        txns.retain(|t| &t.account_id == account_id && since.map_or(true, |s| t.trade_date >= s));
        txns.sort_by_key(|t| t.trade_date);
        Ok(txns)
    }
}
