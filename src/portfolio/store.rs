use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::{PortfolioSnapshot, SnapshotType};
use crate::models::Id;

/// Time-series persistence for snapshots, idempotent on
/// `(entity_id, date, snapshot_type)`: writing the same key again replaces
/// the earlier row.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn upsert(&self, snapshot: &PortfolioSnapshot) -> Result<()>;

    /// Snapshots for `entity_id` with a date in `dates`, ascending by date and
    /// then snapshot type.
    async fn query(
        &self,
        entity_id: &Id,
        dates: RangeInclusive<NaiveDate>,
        snapshot_type: Option<SnapshotType>,
    ) -> Result<Vec<PortfolioSnapshot>>;
}

type SnapshotKey = (NaiveDate, SnapshotType);

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<BTreeMap<Id, BTreeMap<SnapshotKey, PortfolioSnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_count(&self) -> usize {
        self.snapshots.lock().await.values().map(BTreeMap::len).sum()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn upsert(&self, snapshot: &PortfolioSnapshot) -> Result<()> {
        self.snapshots
            .lock()
            .await
            .entry(snapshot.entity_id.clone())
            .or_default()
            .insert((snapshot.date, snapshot.snapshot_type), snapshot.clone());
        Ok(())
    }

    async fn query(
        &self,
        entity_id: &Id,
        dates: RangeInclusive<NaiveDate>,
        snapshot_type: Option<SnapshotType>,
    ) -> Result<Vec<PortfolioSnapshot>> {
        let snapshots = self.snapshots.lock().await;
        Ok(snapshots
            .get(entity_id)
            .into_iter()
            .flat_map(|rows| rows.values())
            .filter(|s| dates.contains(&s.date))
            .filter(|s| snapshot_type.map_or(true, |t| s.snapshot_type == t))
            .cloned()
            .collect())
    }
}
