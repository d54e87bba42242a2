use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use super::{AccountBreakdown, PortfolioSnapshot, SecurityValuation, SnapshotStore, SnapshotType};
use crate::error::EngineError;
use crate::models::Id;
use crate::storage::files::{read_jsonl, write_jsonl};

/// File-backed snapshot series: `{base}/snapshots/{entity}.jsonl`, one row per
/// `(date, snapshot_type)`.
///
/// The account breakdown is stored as a JSON string column. A row whose
/// breakdown does not decode is dropped on read; the rest of the series is
/// unaffected.
pub struct JsonlSnapshotStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotRow {
    entity_id: Id,
    date: NaiveDate,
    snapshot_type: SnapshotType,
    total_value: Decimal,
    securities_value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cash_value: Option<Decimal>,
    total_cost_basis: Decimal,
    total_gain_loss: Decimal,
    total_gain_loss_percent: Decimal,
    #[serde(default)]
    securities: Vec<SecurityValuation>,
    /// Serialized `Vec<AccountBreakdown>`.
    account_breakdown: String,
    securities_count: usize,
    data_quality_score: Decimal,
    created_at: DateTime<Utc>,
}

impl SnapshotRow {
    fn encode(snapshot: &PortfolioSnapshot) -> Result<Self> {
        Ok(Self {
            entity_id: snapshot.entity_id.clone(),
            date: snapshot.date,
            snapshot_type: snapshot.snapshot_type,
            total_value: snapshot.total_value,
            securities_value: snapshot.securities_value,
            cash_value: snapshot.cash_value,
            total_cost_basis: snapshot.total_cost_basis,
            total_gain_loss: snapshot.total_gain_loss,
            total_gain_loss_percent: snapshot.total_gain_loss_percent,
            securities: snapshot.securities.clone(),
            account_breakdown: serde_json::to_string(&snapshot.accounts)
                .context("Failed to serialize account breakdown")?,
            securities_count: snapshot.securities_count,
            data_quality_score: snapshot.data_quality_score,
            created_at: snapshot.created_at,
        })
    }

    fn decode(self) -> Result<PortfolioSnapshot, EngineError> {
        let accounts: Vec<AccountBreakdown> = serde_json::from_str(&self.account_breakdown)
            .map_err(|err| EngineError::MalformedStoredData {
                context: format!("snapshot {} {}", self.entity_id, self.date),
                message: err.to_string(),
            })?;
        Ok(PortfolioSnapshot {
            entity_id: self.entity_id,
            date: self.date,
            snapshot_type: self.snapshot_type,
            total_value: self.total_value,
            securities_value: self.securities_value,
            cash_value: self.cash_value,
            total_cost_basis: self.total_cost_basis,
            total_gain_loss: self.total_gain_loss,
            total_gain_loss_percent: self.total_gain_loss_percent,
            securities: self.securities,
            accounts,
            securities_count: self.securities_count,
            data_quality_score: self.data_quality_score,
            created_at: self.created_at,
        })
    }
}

impl JsonlSnapshotStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn entity_file(&self, entity_id: &Id) -> PathBuf {
        self.base_path
            .join("snapshots")
            .join(format!("{}.jsonl", entity_id.file_stem()))
    }

    async fn read_rows(&self, entity_id: &Id) -> Result<Vec<SnapshotRow>> {
        read_jsonl(&self.entity_file(entity_id), "snapshot").await
    }
}

#[async_trait::async_trait]
impl SnapshotStore for JsonlSnapshotStore {
    async fn upsert(&self, snapshot: &PortfolioSnapshot) -> Result<()> {
        let row = SnapshotRow::encode(snapshot)?;
        let _guard = self.write_lock.lock().await;

        let mut rows: BTreeMap<(NaiveDate, SnapshotType), SnapshotRow> = self
            .read_rows(&snapshot.entity_id)
            .await?
            .into_iter()
            .map(|r| ((r.date, r.snapshot_type), r))
            .collect();
        rows.insert((row.date, row.snapshot_type), row);

        let rows: Vec<SnapshotRow> = rows.into_values().collect();
        write_jsonl(&self.entity_file(&snapshot.entity_id), &rows).await
    }

    async fn query(
        &self,
        entity_id: &Id,
        dates: RangeInclusive<NaiveDate>,
        snapshot_type: Option<SnapshotType>,
    ) -> Result<Vec<PortfolioSnapshot>> {
        let mut found: BTreeMap<(NaiveDate, SnapshotType), PortfolioSnapshot> = BTreeMap::new();
        for row in self.read_rows(entity_id).await? {
            if !dates.contains(&row.date) || snapshot_type.is_some_and(|t| row.snapshot_type != t) {
                continue;
            }
            match row.decode() {
                Ok(snapshot) => {
                    found.insert((snapshot.date, snapshot.snapshot_type), snapshot);
                }
                Err(err) => warn!(entity_id = %entity_id, error = %err, "skipping snapshot row"),
            }
        }
        Ok(found.into_values().collect())
    }
}
