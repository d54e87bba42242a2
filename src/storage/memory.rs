//! In-memory broker data for tests and embedding.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::models::{Account, CurrentHolding, Id, Transaction};

use super::{HoldingsProvider, TransactionProvider};

#[derive(Default)]
pub struct MemoryBrokerData {
    accounts: Mutex<HashMap<Id, Vec<Account>>>,
    holdings: Mutex<HashMap<Id, Vec<CurrentHolding>>>,
    cash: Mutex<HashMap<Id, Decimal>>,
    transactions: Mutex<HashMap<Id, Vec<Transaction>>>,
}

impl MemoryBrokerData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with no accounts.
    pub async fn add_user(&self, user_id: &Id) {
        self.accounts.lock().await.entry(user_id.clone()).or_default();
    }

    pub async fn add_account(&self, account: Account) {
        let mut accounts = self.accounts.lock().await;
        let list = accounts.entry(account.user_id.clone()).or_default();
        list.retain(|a| a.id != account.id);
        list.push(account);
    }

    /// Replace the account's live positions.
    pub async fn set_holdings(&self, account_id: &Id, holdings: Vec<CurrentHolding>) {
        self.holdings.lock().await.insert(account_id.clone(), holdings);
    }

    pub async fn set_cash(&self, account_id: &Id, amount: Decimal) {
        self.cash.lock().await.insert(account_id.clone(), amount);
    }

    pub async fn add_transactions(&self, account_id: &Id, txns: Vec<Transaction>) {
        self.transactions
            .lock()
            .await
            .entry(account_id.clone())
            .or_default()
            .extend(txns);
    }

    async fn scoped_accounts(&self, user_id: &Id, account_id: Option<&Id>) -> Vec<Id> {
        let accounts = self.accounts.lock().await;
        accounts
            .get(user_id)
            .into_iter()
            .flatten()
            .filter(|a| account_id.map_or(true, |id| &a.id == id))
            .map(|a| a.id.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl HoldingsProvider for MemoryBrokerData {
    async fn list_accounts(&self, user_id: &Id) -> Result<Option<Vec<Account>>> {
        Ok(self.accounts.lock().await.get(user_id).cloned())
    }

    async fn get_current_holdings(
        &self,
        user_id: &Id,
        account_id: Option<&Id>,
    ) -> Result<Vec<CurrentHolding>> {
        let scope = self.scoped_accounts(user_id, account_id).await;
        let holdings = self.holdings.lock().await;
        Ok(scope
            .iter()
            .filter_map(|id| holdings.get(id))
            .flatten()
            .cloned()
            .collect())
    }

    async fn get_cash_balance(&self, user_id: &Id, account_id: Option<&Id>) -> Result<Decimal> {
        let scope = self.scoped_accounts(user_id, account_id).await;
        let cash = self.cash.lock().await;
        Ok(scope.iter().filter_map(|id| cash.get(id)).copied().sum())
    }
}

#[async_trait::async_trait]
impl TransactionProvider for MemoryBrokerData {
    async fn get_transactions(
        &self,
        account_id: &Id,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.lock().await;
        let mut txns: Vec<Transaction> = transactions
            .get(account_id)
            .into_iter()
            .flatten()
            .filter(|t| since.map_or(true, |s| t.trade_date >= s))
            .cloned()
            .collect();
        txns.sort_by_key(|t| t.trade_date);
        Ok(txns)
    }
}
