use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use super::snapshot::{SecurityContext, SnapshotBuilder, TablePrices};
use super::{SnapshotStore, SnapshotType};
use crate::clock::{Clock, SystemClock};
use crate::error::Outcome;
use crate::market_data::{PriceFetchReport, PriceService};
use crate::models::{Account, CurrentHolding, Id, Security, SecurityType};
use crate::replay::{replay, unwind_to_opening, Position, ReplayOptions, ReplayResult, ReplayWarning};
use crate::storage::{require_accounts, HoldingsProvider, TransactionProvider};
use crate::symbols::{Resolution, SymbolResolver};

/// What one reconstruction run did. Nothing in here aborted the run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconstructionReport {
    pub user_id: Id,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub dates_written: usize,
    /// Dates where at least one security was valued without a market price.
    pub degraded_dates: Vec<NaiveDate>,
    /// Dates whose snapshot could not be stored.
    pub failed_dates: Vec<NaiveDate>,
    pub accounts_skipped: Vec<(Id, String)>,
    /// Provider ids excluded from market pricing.
    pub unresolved: Vec<String>,
    pub replay_warnings: Vec<ReplayWarning>,
    pub prices: PriceFetchReport,
}

struct AccountHistory {
    account_id: Id,
    replayed: ReplayResult,
    /// Every security the account held or traded, by provider id.
    securities: BTreeMap<String, Security>,
    live: BTreeMap<String, CurrentHolding>,
}

/// Rebuilds a user's daily snapshots from current holdings, transactions and
/// historical prices.
pub struct Reconstructor {
    holdings: Arc<dyn HoldingsProvider>,
    transactions: Arc<dyn TransactionProvider>,
    resolver: Arc<SymbolResolver>,
    prices: Arc<PriceService>,
    snapshots: Arc<dyn SnapshotStore>,
    replay: ReplayOptions,
    clock: Arc<dyn Clock>,
}

impl Reconstructor {
    pub fn new(
        holdings: Arc<dyn HoldingsProvider>,
        transactions: Arc<dyn TransactionProvider>,
        resolver: Arc<SymbolResolver>,
        prices: Arc<PriceService>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            holdings,
            transactions,
            resolver,
            prices,
            snapshots,
            replay: ReplayOptions::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Settlement lag and same-day ordering. Any window is ignored; each run
    /// sets its own.
    pub fn with_replay_options(mut self, options: ReplayOptions) -> Self {
        self.replay = ReplayOptions {
            window: None,
            ..options
        };
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reconstruct and upsert one user-level snapshot per date in
    /// `[start, end]` on which anything was held.
    ///
    /// Fails only when the user is unknown; per-account, per-security and
    /// per-date problems are recorded in the report.
    pub async fn reconstruct(
        &self,
        user_id: &Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReconstructionReport> {
        let accounts = require_accounts(self.holdings.as_ref(), user_id).await?;
        let mut report = ReconstructionReport {
            user_id: user_id.clone(),
            start,
            end,
            dates_written: 0,
            degraded_dates: Vec::new(),
            failed_dates: Vec::new(),
            accounts_skipped: Vec::new(),
            unresolved: Vec::new(),
            replay_warnings: Vec::new(),
            prices: PriceFetchReport::default(),
        };
        if end < start {
            return Ok(report);
        }

        let loaded = join_all(
            accounts
                .iter()
                .map(|account| self.load_account(user_id, account, start, end)),
        )
        .await;

        let mut histories = Vec::new();
        for (account, outcome) in accounts.iter().zip(loaded) {
            match outcome {
                Outcome::Ok(history) | Outcome::Degraded(history, _) => histories.push(history),
                Outcome::Skipped(reason) => {
                    warn!(user_id = %user_id, account_id = %account.id, reason = %reason, "skipping account");
                    report.accounts_skipped.push((account.id.clone(), reason));
                }
            }
        }
        for history in &histories {
            report
                .replay_warnings
                .extend(history.replayed.warnings.iter().cloned());
        }

        let resolutions = self.resolve(&histories).await;
        report.unresolved = resolutions
            .iter()
            .filter(|(_, r)| !r.is_resolved())
            .map(|(id, _)| id.clone())
            .collect();

        let symbols: BTreeSet<&str> = resolutions
            .values()
            .filter_map(|r| r.symbol.as_deref())
            .collect();
        let lookback = self.prices.lookback_days();
        let (table, price_report) = self
            .prices
            .get_prices_with_report(symbols, start - Duration::days(i64::from(lookback)), end)
            .await?;
        report.prices = price_report;
        let lookup = TablePrices::new(&table, lookback);

        let contexts: Vec<BTreeMap<String, SecurityContext>> = histories
            .iter()
            .map(|h| Self::security_contexts(h, &resolutions))
            .collect();

        let builder = SnapshotBuilder::new(SnapshotType::Reconstructed, self.clock.now());
        for date in start.iter_days().take_while(|d| *d <= end) {
            let mut parts = Vec::new();
            let mut degraded = false;
            for (history, context) in histories.iter().zip(&contexts) {
                let Some(state) = history.replayed.state_on(date) else {
                    continue;
                };
                match builder.build(&history.account_id, state, context, &lookup) {
                    Outcome::Ok(snapshot) => parts.push(snapshot),
                    Outcome::Degraded(snapshot, _) => {
                        degraded = true;
                        parts.push(snapshot);
                    }
                    Outcome::Skipped(_) => {}
                }
            }
            if parts.is_empty() {
                continue;
            }

            let snapshot = builder.aggregate(user_id, date, parts);
            match self.snapshots.upsert(&snapshot).await {
                Ok(()) => {
                    report.dates_written += 1;
                    if degraded {
                        report.degraded_dates.push(date);
                    }
                }
                Err(err) => {
                    warn!(user_id = %user_id, date = %date, error = %err, "failed to store snapshot");
                    report.failed_dates.push(date);
                }
            }
        }

        info!(
            user_id = %user_id,
            start = %start,
            end = %end,
            dates_written = report.dates_written,
            degraded = report.degraded_dates.len(),
            unresolved = report.unresolved.len(),
            "reconstructed portfolio history"
        );
        Ok(report)
    }

    async fn load_account(
        &self,
        user_id: &Id,
        account: &Account,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Outcome<AccountHistory> {
        let holdings = match self
            .holdings
            .get_current_holdings(user_id, Some(&account.id))
            .await
        {
            Ok(holdings) => holdings,
            Err(err) => return Outcome::Skipped(format!("holdings unavailable: {err:#}")),
        };

        let since = start - Duration::days(i64::from(self.replay.settlement_lag_days));
        let transactions = match self
            .transactions
            .get_transactions(&account.id, Some(since))
            .await
        {
            Ok(transactions) => transactions,
            Err(err) => return Outcome::Skipped(format!("transactions unavailable: {err:#}")),
        };
        // Events settled before the window are already reflected in the opening state.
        let transactions: Vec<_> = transactions
            .into_iter()
            .filter(|tx| self.replay.effective_date(tx) >= start)
            .collect();

        let mut current: BTreeMap<String, Position> = BTreeMap::new();
        let mut securities: BTreeMap<String, Security> = BTreeMap::new();
        let mut live: BTreeMap<String, CurrentHolding> = BTreeMap::new();
        for holding in holdings {
            let id = holding.security.provider_id.clone();
            let position = current.entry(id.clone()).or_default();
            position.quantity += holding.quantity;
            position.cost_basis += holding.cost_basis;
            securities
                .entry(id.clone())
                .or_insert_with(|| holding.security.clone());
            live.entry(id)
                .and_modify(|h| {
                    h.quantity += holding.quantity;
                    h.market_value += holding.market_value;
                })
                .or_insert(holding);
        }
        for tx in &transactions {
            securities.entry(tx.security_id.clone()).or_insert_with(|| {
                Security::new(tx.security_id.clone(), SecurityType::Equity)
                    .with_ticker(tx.security_id.clone())
            });
        }

        let (opening, unwind_warnings) =
            unwind_to_opening(&current, &transactions, start, &self.replay);
        let options = self.replay.clone().with_window(start, end);
        let mut replayed = replay(&transactions, &opening, &options);
        replayed.warnings.splice(0..0, unwind_warnings);

        let history = AccountHistory {
            account_id: account.id.clone(),
            replayed,
            securities,
            live,
        };
        if history.replayed.warnings.is_empty() {
            Outcome::Ok(history)
        } else {
            let count = history.replayed.warnings.len();
            Outcome::Degraded(history, format!("{count} inconsistent transactions"))
        }
    }

    /// Resolve every non-cash security across accounts.
    async fn resolve(&self, histories: &[AccountHistory]) -> BTreeMap<String, Resolution> {
        let mut unique: BTreeMap<&str, &Security> = BTreeMap::new();
        for history in histories {
            for (id, security) in &history.securities {
                if !security.security_type.is_cash() {
                    unique.entry(id.as_str()).or_insert(security);
                }
            }
        }
        let securities: Vec<Security> = unique.into_values().cloned().collect();
        self.resolver.resolve_all(&securities).await
    }

    fn security_contexts(
        history: &AccountHistory,
        resolutions: &BTreeMap<String, Resolution>,
    ) -> BTreeMap<String, SecurityContext> {
        history
            .securities
            .iter()
            .map(|(id, security)| {
                let symbol = resolutions.get(id).and_then(|r| r.symbol.clone());
                let context = match history.live.get(id) {
                    Some(holding) => SecurityContext::from_holding(holding, symbol),
                    None => SecurityContext::unpriced(symbol, security.security_type),
                };
                (id.clone(), context)
            })
            .collect()
    }
}

/// Earliest date a reconstruction of `days` days back from `today` starts on.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today - Duration::days(i64::from(days.max(1)) - 1)
}
