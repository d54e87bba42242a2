use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{AccountBreakdown, PortfolioSnapshot, PriceSource, SecurityValuation, SnapshotStore, SnapshotType};
use crate::clock::{Clock, SystemClock};
use crate::error::Outcome;
use crate::models::{CurrentHolding, Id};
use crate::storage::{require_accounts, HoldingsProvider};

/// Records today's end-of-day snapshot from live broker values.
pub struct DailyCapture {
    holdings: Arc<dyn HoldingsProvider>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
}

impl DailyCapture {
    pub fn new(holdings: Arc<dyn HoldingsProvider>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            holdings,
            snapshots,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Capture and upsert a `DailyEod` snapshot for today.
    ///
    /// Accounts whose holdings or cash cannot be read are left out and the
    /// result is `Degraded`; a user with nothing to record is `Skipped`.
    pub async fn capture(&self, user_id: &Id) -> Result<Outcome<PortfolioSnapshot>> {
        let accounts = require_accounts(self.holdings.as_ref(), user_id).await?;
        let today = self.clock.today();

        let mut securities = Vec::new();
        let mut breakdowns = Vec::new();
        let mut failed = Vec::new();
        for account in &accounts {
            let holdings = match self
                .holdings
                .get_current_holdings(user_id, Some(&account.id))
                .await
            {
                Ok(holdings) => holdings,
                Err(err) => {
                    warn!(user_id = %user_id, account_id = %account.id, error = %err, "holdings unavailable");
                    failed.push(account.id.to_string());
                    continue;
                }
            };
            let cash = match self
                .holdings
                .get_cash_balance(user_id, Some(&account.id))
                .await
            {
                Ok(cash) => Some(cash),
                Err(err) => {
                    warn!(user_id = %user_id, account_id = %account.id, error = %err, "cash balance unavailable");
                    None
                }
            };

            let valued = value_holdings(&account.id, holdings);
            let securities_value: Decimal = valued.iter().map(|s| s.market_value).sum();
            let cost_basis: Decimal = valued.iter().map(|s| s.cost_basis).sum();
            breakdowns.push(AccountBreakdown {
                account_id: account.id.clone(),
                securities_value,
                cash_value: cash,
                total_value: securities_value + cash.unwrap_or(Decimal::ZERO),
                cost_basis,
            });
            securities.extend(valued);
        }

        if breakdowns.is_empty() {
            return Ok(Outcome::Skipped(format!("no readable accounts for {user_id}")));
        }

        let snapshot = PortfolioSnapshot::from_parts(
            user_id.clone(),
            today,
            SnapshotType::DailyEod,
            securities,
            breakdowns,
            self.clock.now(),
        );
        self.snapshots.upsert(&snapshot).await?;
        info!(
            user_id = %user_id,
            date = %today,
            total_value = %snapshot.total_value,
            "captured end-of-day snapshot"
        );

        if failed.is_empty() {
            Ok(Outcome::Ok(snapshot))
        } else {
            let reason = format!("accounts left out: {}", failed.join(", "));
            Ok(Outcome::Degraded(snapshot, reason))
        }
    }
}

/// Live positions merged per security and valued at the broker's market value.
fn value_holdings(account_id: &Id, holdings: Vec<CurrentHolding>) -> Vec<SecurityValuation> {
    let mut merged: BTreeMap<String, CurrentHolding> = BTreeMap::new();
    for holding in holdings {
        merged
            .entry(holding.security.provider_id.clone())
            .and_modify(|h| {
                h.quantity += holding.quantity;
                h.cost_basis += holding.cost_basis;
                h.market_value += holding.market_value;
            })
            .or_insert(holding);
    }

    merged
        .into_iter()
        .filter(|(_, h)| h.quantity > Decimal::ZERO)
        .map(|(security_id, h)| {
            let price = h.market_value / h.quantity;
            let source = if h.security.security_type.is_cash() {
                PriceSource::Par
            } else {
                PriceSource::Market
            };
            SecurityValuation {
                account_id: account_id.clone(),
                security_id,
                symbol: h.security.ticker.clone(),
                security_type: h.security.security_type,
                quantity: h.quantity,
                price: Some(price),
                price_date: None,
                market_value: h.market_value,
                cost_basis: h.cost_basis,
                price_source: source,
            }
        })
        .collect()
}
