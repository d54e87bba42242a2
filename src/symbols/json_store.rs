use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::Mutex;

use super::{MappingCacheStore, SymbolMapping, UnresolvedSecurity};
use crate::storage::files::{read_jsonl, write_jsonl};

/// File-backed mapping cache.
///
/// ```text
/// data/
///   symbols/
///     mappings.jsonl
///     unresolved.jsonl
/// ```
pub struct JsonMappingCacheStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonMappingCacheStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn mappings_file(&self) -> PathBuf {
        self.base_path.join("symbols").join("mappings.jsonl")
    }

    fn unresolved_file(&self) -> PathBuf {
        self.base_path.join("symbols").join("unresolved.jsonl")
    }

    async fn load_mappings(&self) -> Result<BTreeMap<String, SymbolMapping>> {
        Ok(read_jsonl::<SymbolMapping>(&self.mappings_file(), "symbol mapping")
            .await?
            .into_iter()
            .map(|m| (m.provider_id.clone(), m))
            .collect())
    }

    async fn load_unresolved(&self) -> Result<BTreeMap<String, UnresolvedSecurity>> {
        Ok(read_jsonl::<UnresolvedSecurity>(&self.unresolved_file(), "unresolved security")
            .await?
            .into_iter()
            .map(|u| (u.provider_id.clone(), u))
            .collect())
    }
}

#[async_trait::async_trait]
impl MappingCacheStore for JsonMappingCacheStore {
    async fn get(&self, provider_id: &str) -> Result<Option<SymbolMapping>> {
        Ok(self.load_mappings().await?.remove(provider_id))
    }

    async fn upsert(&self, mapping: &SymbolMapping) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut mappings = self.load_mappings().await?;
        mappings.insert(mapping.provider_id.clone(), mapping.clone());
        let rows: Vec<SymbolMapping> = mappings.into_values().collect();
        write_jsonl(&self.mappings_file(), &rows).await?;

        let mut unresolved = self.load_unresolved().await?;
        if unresolved.remove(&mapping.provider_id).is_some() {
            let rows: Vec<UnresolvedSecurity> = unresolved.into_values().collect();
            write_jsonl(&self.unresolved_file(), &rows).await?;
        }
        Ok(())
    }

    async fn record_unresolved(&self, entry: UnresolvedSecurity) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut unresolved = self.load_unresolved().await?;
        match unresolved.get_mut(&entry.provider_id) {
            Some(existing) => existing.merge_attempt(entry),
            None => {
                unresolved.insert(entry.provider_id.clone(), entry);
            }
        }
        let rows: Vec<UnresolvedSecurity> = unresolved.into_values().collect();
        write_jsonl(&self.unresolved_file(), &rows).await
    }

    async fn list_unresolved(&self) -> Result<Vec<UnresolvedSecurity>> {
        Ok(self.load_unresolved().await?.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Security;
    use crate::symbols::ResolutionMethod;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn mappings_survive_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mapping = SymbolMapping {
            provider_id: "sec-123".to_string(),
            symbol: "VTI".to_string(),
            confidence: 95,
            method: ResolutionMethod::IdentifierLookup,
            resolved_at: at,
        };

        {
            let store = JsonMappingCacheStore::new(dir.path());
            let security = Security::new("sec-123", Default::default()).with_name("Vanguard");
            store
                .record_unresolved(UnresolvedSecurity::from_security(&security, at))
                .await?;
            store.upsert(&mapping).await?;
            store.upsert(&mapping).await?;
        }

        let store = JsonMappingCacheStore::new(dir.path());
        assert_eq!(store.get("sec-123").await?, Some(mapping));
        assert!(store.list_unresolved().await?.is_empty());

        let raw = std::fs::read_to_string(dir.path().join("symbols/mappings.jsonl"))?;
        assert_eq!(raw.lines().count(), 1);
        Ok(())
    }
}
