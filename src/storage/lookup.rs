use anyhow::Result;

use crate::error::EngineError;
use crate::models::{Account, Id};

use super::HoldingsProvider;

/// The user's accounts, or `UserNotFound`.
pub async fn require_accounts(provider: &dyn HoldingsProvider, user_id: &Id) -> Result<Vec<Account>> {
    provider
        .list_accounts(user_id)
        .await?
        .ok_or_else(|| EngineError::UserNotFound(user_id.clone()).into())
}

/// Find one of the user's accounts by id, or by case-insensitive name.
pub async fn find_account(
    provider: &dyn HoldingsProvider,
    user_id: &Id,
    id_or_name: &str,
) -> Result<Account> {
    let accounts = require_accounts(provider, user_id).await?;

    if let Some(account) = accounts.iter().find(|a| a.id.as_str() == id_or_name) {
        return Ok(account.clone());
    }

    let mut matches: Vec<&Account> = accounts
        .iter()
        .filter(|a| a.name.eq_ignore_ascii_case(id_or_name))
        .collect();

    if matches.len() > 1 {
        let ids: Vec<String> = matches.iter().map(|a| a.id.to_string()).collect();
        anyhow::bail!("Multiple accounts named '{id_or_name}'. Use an ID instead: {ids:?}");
    }

    match matches.pop() {
        Some(account) => Ok(account.clone()),
        None => Err(EngineError::AccountNotFound {
            user: user_id.clone(),
            account: Id::from(id_or_name),
        }
        .into()),
    }
}
