use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChartPeriod, PortfolioSnapshot, SnapshotStore, SnapshotType};
use crate::clock::{start_of_day, Clock, SystemClock};
use crate::error::EngineError;
use crate::models::Id;
use crate::storage::{require_accounts, HoldingsProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Daily snapshots followed by a live point.
    Historical,
    /// Synthesized hourly points between yesterday's close and now.
    Interpolated,
    /// A single live point; no history exists yet.
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

/// Chart-ready series. `timestamps` are unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySeries {
    pub period: ChartPeriod,
    pub timestamps: Vec<i64>,
    pub equity: Vec<f64>,
    pub profit_loss: Vec<f64>,
    pub profit_loss_pct: Vec<f64>,
    pub base_value: f64,
    pub data_source: DataSource,
    #[serde(skip)]
    pub points: Vec<HistoryPoint>,
}

fn to_f64(value: Decimal) -> f64 {
    value.round_dp(2).to_f64().unwrap_or(0.0)
}

impl HistorySeries {
    /// Profit/loss is measured against the first point.
    pub fn from_points(period: ChartPeriod, points: Vec<HistoryPoint>, data_source: DataSource) -> Self {
        let base = points.first().map_or(Decimal::ZERO, |p| p.value);
        let mut series = Self {
            period,
            timestamps: Vec::with_capacity(points.len()),
            equity: Vec::with_capacity(points.len()),
            profit_loss: Vec::with_capacity(points.len()),
            profit_loss_pct: Vec::with_capacity(points.len()),
            base_value: to_f64(base),
            data_source,
            points: Vec::new(),
        };
        for point in &points {
            let change = point.value - base;
            let pct = if base.is_zero() {
                Decimal::ZERO
            } else {
                change / base * Decimal::ONE_HUNDRED
            };
            series.timestamps.push(point.timestamp.timestamp());
            series.equity.push(to_f64(point.value));
            series.profit_loss.push(to_f64(change));
            series.profit_loss_pct.push(to_f64(pct));
        }
        series.points = points;
        series
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Current value of the chart's scope.
#[derive(Debug, Clone, Copy)]
struct LiveValue {
    securities: Decimal,
    cash: Decimal,
}

impl LiveValue {
    fn total(&self) -> Decimal {
        self.securities + self.cash
    }
}

/// Builds chart series for a user or one of their accounts from stored
/// snapshots plus a live point.
pub struct HistoryAssembler {
    snapshots: Arc<dyn SnapshotStore>,
    holdings: Arc<dyn HoldingsProvider>,
    clock: Arc<dyn Clock>,
    near_zero_threshold: Decimal,
}

impl HistoryAssembler {
    pub fn new(snapshots: Arc<dyn SnapshotStore>, holdings: Arc<dyn HoldingsProvider>) -> Self {
        Self {
            snapshots,
            holdings,
            clock: Arc::new(SystemClock),
            near_zero_threshold: Decimal::ONE,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_near_zero_threshold(mut self, threshold: Decimal) -> Self {
        self.near_zero_threshold = threshold;
        self
    }

    /// Series for `user_id` (or one of their accounts) over `period`.
    ///
    /// Errors only when the user or account cannot be identified; every other
    /// gap degrades to fewer points, down to an empty live series.
    pub async fn assemble(
        &self,
        user_id: &Id,
        period: ChartPeriod,
        account_id: Option<&Id>,
    ) -> Result<HistorySeries> {
        let accounts = require_accounts(self.holdings.as_ref(), user_id).await?;
        if let Some(account_id) = account_id {
            if !accounts.iter().any(|a| &a.id == account_id) {
                return Err(EngineError::AccountNotFound {
                    user: user_id.clone(),
                    account: account_id.clone(),
                }
                .into());
            }
        }

        let live = match self.live_value(user_id, account_id).await {
            Ok(live) => Some(live),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "live holdings lookup failed");
                None
            }
        };
        let current_cash = live.map_or(Decimal::ZERO, |l| l.cash);

        if period.is_intraday() {
            return self
                .interpolated(user_id, account_id, live, current_cash)
                .await;
        }

        let today = self.clock.today();
        let start = period.start_date(today).unwrap_or(NaiveDate::MIN);
        let mut points = self
            .daily_points(user_id, account_id, start, today - Duration::days(1), current_cash)
            .await?;

        let data_source = if points.is_empty() {
            DataSource::Live
        } else {
            DataSource::Historical
        };
        match live {
            Some(live) => points.push(HistoryPoint {
                timestamp: self.clock.now(),
                value: live.total(),
            }),
            None if points.is_empty() => {
                warn!(user_id = %user_id, period = %period, "no history and no live value, returning empty series");
            }
            None => {}
        }

        debug!(
            user_id = %user_id,
            account_id = account_id.map(|a| a.as_str()).unwrap_or("-"),
            period = %period,
            points = points.len(),
            "assembled history"
        );
        Ok(HistorySeries::from_points(period, points, data_source))
    }

    async fn live_value(&self, user_id: &Id, account_id: Option<&Id>) -> Result<LiveValue> {
        let holdings = self
            .holdings
            .get_current_holdings(user_id, account_id)
            .await?;
        let cash = self.holdings.get_cash_balance(user_id, account_id).await?;
        Ok(LiveValue {
            securities: holdings.iter().map(|h| h.market_value).sum(),
            cash,
        })
    }

    /// One snapshot per date, a daily-EOD capture beating a reconstruction.
    async fn snapshots_by_date(
        &self,
        user_id: &Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, PortfolioSnapshot>> {
        let mut by_date: BTreeMap<NaiveDate, PortfolioSnapshot> = BTreeMap::new();
        if end < start {
            return Ok(by_date);
        }
        for snapshot in self.snapshots.query(user_id, start..=end, None).await? {
            let replace = by_date.get(&snapshot.date).map_or(true, |existing| {
                existing.snapshot_type == SnapshotType::Reconstructed
                    && snapshot.snapshot_type == SnapshotType::DailyEod
            });
            if replace {
                by_date.insert(snapshot.date, snapshot);
            }
        }
        Ok(by_date)
    }

    /// Value of the scope in one snapshot, or `None` when the scope did not
    /// exist yet that day.
    ///
    /// Account values come from the stored breakdown, never from scaling the
    /// total. Dates whose securities value is below the near-zero threshold are
    /// dropped even when cash is known.
    fn point_value(
        &self,
        snapshot: &PortfolioSnapshot,
        account_id: Option<&Id>,
        current_cash: Decimal,
    ) -> Option<Decimal> {
        let (securities, recorded_cash) = match account_id {
            Some(account_id) => {
                let breakdown = snapshot.account(account_id)?;
                (breakdown.securities_value, breakdown.cash_value)
            }
            None => (snapshot.securities_value, snapshot.cash_value),
        };
        if securities < self.near_zero_threshold {
            return None;
        }
        Some(securities + recorded_cash.unwrap_or(current_cash))
    }

    async fn daily_points(
        &self,
        user_id: &Id,
        account_id: Option<&Id>,
        start: NaiveDate,
        end: NaiveDate,
        current_cash: Decimal,
    ) -> Result<Vec<HistoryPoint>> {
        let snapshots = self.snapshots_by_date(user_id, start, end).await?;
        let mut points = Vec::with_capacity(snapshots.len());
        let mut excluded = 0usize;
        for (date, snapshot) in &snapshots {
            match self.point_value(snapshot, account_id, current_cash) {
                Some(value) => points.push(HistoryPoint {
                    timestamp: start_of_day(*date),
                    value,
                }),
                None => excluded += 1,
            }
        }
        if excluded > 0 {
            debug!(user_id = %user_id, excluded, "dropped near-zero history dates");
        }
        Ok(points)
    }

    /// Hourly points from midnight UTC, interpolated linearly between
    /// yesterday's close and the live value, ending with a point at now.
    async fn interpolated(
        &self,
        user_id: &Id,
        account_id: Option<&Id>,
        live: Option<LiveValue>,
        current_cash: Decimal,
    ) -> Result<HistorySeries> {
        let today = self.clock.today();
        let previous = self
            .daily_points(
                user_id,
                account_id,
                today - Duration::days(7),
                today - Duration::days(1),
                current_cash,
            )
            .await?
            .last()
            .map(|p| p.value);

        let (open, close) = match (previous, live.map(|l| l.total())) {
            (Some(open), Some(close)) => (open, close),
            (Some(open), None) => (open, open),
            (None, Some(close)) => (close, close),
            (None, None) => {
                warn!(user_id = %user_id, "no history and no live value, returning empty series");
                return Ok(HistorySeries::from_points(
                    ChartPeriod::OneDay,
                    Vec::new(),
                    DataSource::Live,
                ));
            }
        };

        let now = self.clock.now();
        let midnight = self.clock.start_of_today();
        let span = (now - midnight).num_seconds();
        let mut points = Vec::new();
        if span > 0 {
            for hour in 0..24 {
                let timestamp = midnight + Duration::hours(hour);
                if timestamp >= now {
                    break;
                }
                let elapsed = (timestamp - midnight).num_seconds();
                let value = open + (close - open) * Decimal::from(elapsed) / Decimal::from(span);
                points.push(HistoryPoint { timestamp, value });
            }
        }
        points.push(HistoryPoint {
            timestamp: now,
            value: close,
        });

        Ok(HistorySeries::from_points(
            ChartPeriod::OneDay,
            points,
            DataSource::Interpolated,
        ))
    }
}
