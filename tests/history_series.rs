mod support;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use support::{date, user_snapshot};
use wealthline::clock::FixedClock;
use wealthline::error::EngineError;
use wealthline::models::{Account, CurrentHolding, Id, Security};
use wealthline::portfolio::{
    ChartPeriod, DataSource, HistoryAssembler, MemorySnapshotStore, SnapshotStore, SnapshotType,
};
use wealthline::storage::{HoldingsProvider, MemoryBrokerData};

async fn broker() -> Arc<MemoryBrokerData> {
    let broker = Arc::new(MemoryBrokerData::new());
    broker.add_account(Account::new("acct-a", "user-1", "Taxable")).await;
    broker.add_account(Account::new("acct-x", "user-1", "New IRA")).await;
    broker
}

async fn hold(broker: &MemoryBrokerData, account: &str, value: rust_decimal::Decimal) {
    broker
        .set_holdings(
            &Id::from(account),
            vec![CurrentHolding::new(
                account,
                Security::equity("VTI"),
                dec!(10),
                value,
                value,
            )],
        )
        .await;
}

fn assembler(snapshots: Arc<MemorySnapshotStore>, broker: Arc<MemoryBrokerData>) -> HistoryAssembler {
    HistoryAssembler::new(snapshots, broker)
        .with_clock(Arc::new(FixedClock::at(date(2024, 3, 10), 15)))
}

#[tokio::test]
async fn account_that_did_not_exist_yet_has_no_zero_points() -> Result<()> {
    let broker = broker().await;
    hold(&broker, "acct-x", dec!(5000)).await;
    broker.set_cash(&Id::from("acct-x"), dec!(1000)).await;

    let snapshots = Arc::new(MemorySnapshotStore::new());
    for (day, x_value) in [(1, dec!(0)), (2, dec!(0)), (3, dec!(5000))] {
        snapshots
            .upsert(&user_snapshot(
                "user-1",
                date(2024, 3, day),
                SnapshotType::Reconstructed,
                &[("acct-a", dec!(8000), None), ("acct-x", x_value, None)],
            ))
            .await?;
    }

    let series = assembler(snapshots, broker)
        .assemble(&Id::from("user-1"), ChartPeriod::OneMonth, Some(&Id::from("acct-x")))
        .await?;

    assert_eq!(series.len(), 2);
    assert_eq!(series.equity, vec![6000.0, 6000.0]);
    assert_eq!(series.timestamps[0], Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap().timestamp());
    assert_eq!(series.data_source, DataSource::Historical);
    assert!(!series.equity.contains(&1000.0));
    Ok(())
}

#[tokio::test]
async fn account_history_uses_actual_values_not_scaled_totals() -> Result<()> {
    let broker = broker().await;
    hold(&broker, "acct-a", dec!(7700)).await;
    broker.set_cash(&Id::from("acct-a"), dec!(0)).await;

    let snapshots = Arc::new(MemorySnapshotStore::new());
    snapshots
        .upsert(&user_snapshot(
            "user-1",
            date(2024, 3, 1),
            SnapshotType::Reconstructed,
            &[("acct-a", dec!(6000), None), ("acct-x", dec!(4000), None)],
        ))
        .await?;
    snapshots
        .upsert(&user_snapshot(
            "user-1",
            date(2024, 3, 2),
            SnapshotType::Reconstructed,
            &[("acct-a", dec!(7700), None), ("acct-x", dec!(3300), None)],
        ))
        .await?;

    let series = assembler(snapshots, broker)
        .assemble(&Id::from("user-1"), ChartPeriod::OneMonth, Some(&Id::from("acct-a")))
        .await?;

    assert_eq!(&series.equity[..2], &[6000.0, 7700.0]);
    assert_eq!(series.base_value, 6000.0);
    assert_eq!(series.profit_loss[1], 1700.0);
    assert!((series.profit_loss_pct[1] - 28.33).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn recorded_cash_beats_current_cash() -> Result<()> {
    let broker = broker().await;
    hold(&broker, "acct-a", dec!(1000)).await;
    broker.set_cash(&Id::from("acct-a"), dec!(50)).await;

    let snapshots = Arc::new(MemorySnapshotStore::new());
    snapshots
        .upsert(&user_snapshot(
            "user-1",
            date(2024, 3, 4),
            SnapshotType::DailyEod,
            &[("acct-a", dec!(1000), Some(dec!(250)))],
        ))
        .await?;
    snapshots
        .upsert(&user_snapshot(
            "user-1",
            date(2024, 3, 5),
            SnapshotType::Reconstructed,
            &[("acct-a", dec!(1000), None)],
        ))
        .await?;

    let series = assembler(snapshots, broker)
        .assemble(&Id::from("user-1"), ChartPeriod::OneWeek, Some(&Id::from("acct-a")))
        .await?;
    assert_eq!(series.equity, vec![1250.0, 1050.0, 1050.0]);
    Ok(())
}

#[tokio::test]
async fn end_of_day_capture_wins_over_reconstruction() -> Result<()> {
    let broker = broker().await;
    hold(&broker, "acct-a", dec!(2000)).await;

    let snapshots = Arc::new(MemorySnapshotStore::new());
    snapshots
        .upsert(&user_snapshot(
            "user-1",
            date(2024, 3, 8),
            SnapshotType::Reconstructed,
            &[("acct-a", dec!(1900), None)],
        ))
        .await?;
    snapshots
        .upsert(&user_snapshot(
            "user-1",
            date(2024, 3, 8),
            SnapshotType::DailyEod,
            &[("acct-a", dec!(1950), Some(dec!(0)))],
        ))
        .await?;

    let series = assembler(snapshots, broker)
        .assemble(&Id::from("user-1"), ChartPeriod::OneWeek, None)
        .await?;
    assert_eq!(series.equity, vec![1950.0, 2000.0]);
    Ok(())
}

#[tokio::test]
async fn no_history_gives_a_single_live_point() -> Result<()> {
    let broker = broker().await;
    hold(&broker, "acct-a", dec!(1234.5)).await;
    broker.set_cash(&Id::from("acct-a"), dec!(10)).await;

    let series = assembler(Arc::new(MemorySnapshotStore::new()), broker)
        .assemble(&Id::from("user-1"), ChartPeriod::Max, None)
        .await?;
    assert_eq!(series.len(), 1);
    assert_eq!(series.data_source, DataSource::Live);
    assert_eq!(series.equity, vec![1244.5]);
    assert_eq!(series.profit_loss, vec![0.0]);
    Ok(())
}

#[tokio::test]
async fn one_day_chart_interpolates_hourly_to_now() -> Result<()> {
    let broker = broker().await;
    hold(&broker, "acct-a", dec!(1150)).await;

    let snapshots = Arc::new(MemorySnapshotStore::new());
    snapshots
        .upsert(&user_snapshot(
            "user-1",
            date(2024, 3, 9),
            SnapshotType::Reconstructed,
            &[("acct-a", dec!(1000), None)],
        ))
        .await?;

    let series = assembler(snapshots, broker)
        .assemble(&Id::from("user-1"), ChartPeriod::OneDay, None)
        .await?;

    // 00:00 through 14:00, then 15:00 exactly at now.
    assert_eq!(series.data_source, DataSource::Interpolated);
    assert_eq!(series.len(), 16);
    assert_eq!(series.equity[0], 1000.0);
    assert_eq!(series.equity[15], 1150.0);
    assert_eq!(series.equity[5], 1050.0);
    assert!(series.equity.windows(2).all(|w| w[0] <= w[1]));
    Ok(())
}

#[tokio::test]
async fn unknown_account_is_an_explicit_error() {
    let broker = broker().await;
    let err = assembler(Arc::new(MemorySnapshotStore::new()), broker)
        .assemble(&Id::from("user-1"), ChartPeriod::OneMonth, Some(&Id::from("acct-zzz")))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::AccountNotFound { .. })
    ));
}

#[tokio::test]
async fn unknown_user_is_an_explicit_error() {
    let broker = broker().await;
    let err = assembler(Arc::new(MemorySnapshotStore::new()), broker)
        .assemble(&Id::from("user-404"), ChartPeriod::OneMonth, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::UserNotFound(_))
    ));
}

/// Knows the user's accounts but cannot report live holdings.
struct LiveFeedDown {
    inner: Arc<MemoryBrokerData>,
}

#[async_trait::async_trait]
impl HoldingsProvider for LiveFeedDown {
    async fn list_accounts(&self, user_id: &Id) -> Result<Option<Vec<Account>>> {
        self.inner.list_accounts(user_id).await
    }

    async fn get_current_holdings(
        &self,
        _user_id: &Id,
        _account_id: Option<&Id>,
    ) -> Result<Vec<CurrentHolding>> {
        Err(anyhow!("broker API unavailable"))
    }

    async fn get_cash_balance(&self, _user_id: &Id, _account_id: Option<&Id>) -> Result<Decimal> {
        Err(anyhow!("broker API unavailable"))
    }
}

#[tokio::test]
async fn live_outage_without_history_is_an_empty_series() -> Result<()> {
    let holdings = Arc::new(LiveFeedDown {
        inner: broker().await,
    });
    let assembler = HistoryAssembler::new(Arc::new(MemorySnapshotStore::new()), holdings)
        .with_clock(Arc::new(FixedClock::at(date(2024, 3, 10), 15)));

    for period in [ChartPeriod::OneMonth, ChartPeriod::OneDay] {
        let series = assembler
            .assemble(&Id::from("user-1"), period, Some(&Id::from("acct-x")))
            .await?;
        assert!(series.is_empty());
        assert_eq!(series.data_source, DataSource::Live);
        assert!(series.timestamps.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn live_outage_keeps_stored_history() -> Result<()> {
    let holdings = Arc::new(LiveFeedDown {
        inner: broker().await,
    });
    let snapshots = Arc::new(MemorySnapshotStore::new());
    snapshots
        .upsert(&user_snapshot(
            "user-1",
            date(2024, 3, 8),
            SnapshotType::Reconstructed,
            &[("acct-a", dec!(2000), Some(dec!(100)))],
        ))
        .await?;
    let assembler = HistoryAssembler::new(snapshots, holdings)
        .with_clock(Arc::new(FixedClock::at(date(2024, 3, 10), 15)));

    let series = assembler
        .assemble(&Id::from("user-1"), ChartPeriod::OneWeek, None)
        .await?;
    assert_eq!(series.equity, vec![2100.0]);
    assert_eq!(series.data_source, DataSource::Historical);
    Ok(())
}
