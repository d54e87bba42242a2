mod support;

use anyhow::Result;
use rust_decimal_macros::dec;
use support::{date, user_snapshot};
use tempfile::TempDir;
use wealthline::models::Id;
use wealthline::portfolio::{JsonlSnapshotStore, SnapshotStore, SnapshotType};

#[tokio::test]
async fn upsert_twice_keeps_one_row_with_latest_values() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonlSnapshotStore::new(dir.path());
    let user = Id::from("user-1");
    let day = date(2024, 5, 1);

    store
        .upsert(&user_snapshot("user-1", day, SnapshotType::Reconstructed, &[("a", dec!(100), None)]))
        .await?;
    store
        .upsert(&user_snapshot("user-1", day, SnapshotType::Reconstructed, &[("a", dec!(150), None)]))
        .await?;
    store
        .upsert(&user_snapshot("user-1", day, SnapshotType::DailyEod, &[("a", dec!(155), Some(dec!(5)))]))
        .await?;

    let rows = store.query(&user, day..=day, None).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].snapshot_type, SnapshotType::Reconstructed);
    assert_eq!(rows[0].total_value, dec!(150));
    assert_eq!(rows[1].snapshot_type, SnapshotType::DailyEod);
    assert_eq!(rows[1].total_value, dec!(160));

    let eod = store
        .query(&user, day..=day, Some(SnapshotType::DailyEod))
        .await?;
    assert_eq!(eod.len(), 1);
    assert_eq!(eod[0].account(&Id::from("a")).and_then(|b| b.cash_value), Some(dec!(5)));

    // A fresh handle on the same directory sees the same rows.
    let reopened = JsonlSnapshotStore::new(dir.path());
    assert_eq!(reopened.query(&user, day..=day, None).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn query_is_bounded_by_date_range() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonlSnapshotStore::new(dir.path());
    for d in 1..=5 {
        store
            .upsert(&user_snapshot(
                "user-1",
                date(2024, 5, d),
                SnapshotType::Reconstructed,
                &[("a", dec!(100), None)],
            ))
            .await?;
    }
    let rows = store
        .query(&Id::from("user-1"), date(2024, 5, 2)..=date(2024, 5, 4), None)
        .await?;
    let days: Vec<_> = rows.iter().map(|r| r.date).collect();
    assert_eq!(days, vec![date(2024, 5, 2), date(2024, 5, 3), date(2024, 5, 4)]);
    assert!(store.query(&Id::from("user-2"), date(2024, 5, 1)..=date(2024, 5, 5), None).await?.is_empty());
    Ok(())
}
