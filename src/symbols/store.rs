use std::collections::BTreeMap;

use anyhow::Result;
use tokio::sync::Mutex;

use super::{SymbolMapping, UnresolvedSecurity};

/// Permanent provider-id → symbol cache plus the queue of securities that
/// could not be resolved. Upserts replace; duplicate writes are harmless.
#[async_trait::async_trait]
pub trait MappingCacheStore: Send + Sync {
    async fn get(&self, provider_id: &str) -> Result<Option<SymbolMapping>>;

    async fn upsert(&self, mapping: &SymbolMapping) -> Result<()>;

    /// Add to the unresolved queue, merging with an existing entry.
    async fn record_unresolved(&self, entry: UnresolvedSecurity) -> Result<()>;

    async fn list_unresolved(&self) -> Result<Vec<UnresolvedSecurity>>;
}

#[derive(Default)]
pub struct MemoryMappingCacheStore {
    mappings: Mutex<BTreeMap<String, SymbolMapping>>,
    unresolved: Mutex<BTreeMap<String, UnresolvedSecurity>>,
}

impl MemoryMappingCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MappingCacheStore for MemoryMappingCacheStore {
    async fn get(&self, provider_id: &str) -> Result<Option<SymbolMapping>> {
        Ok(self.mappings.lock().await.get(provider_id).cloned())
    }

    async fn upsert(&self, mapping: &SymbolMapping) -> Result<()> {
        self.mappings
            .lock()
            .await
            .insert(mapping.provider_id.clone(), mapping.clone());
        // A confirmed mapping takes the security off the queue.
        self.unresolved.lock().await.remove(&mapping.provider_id);
        Ok(())
    }

    async fn record_unresolved(&self, entry: UnresolvedSecurity) -> Result<()> {
        let mut unresolved = self.unresolved.lock().await;
        match unresolved.get_mut(&entry.provider_id) {
            Some(existing) => existing.merge_attempt(entry),
            None => {
                unresolved.insert(entry.provider_id.clone(), entry);
            }
        }
        Ok(())
    }

    async fn list_unresolved(&self) -> Result<Vec<UnresolvedSecurity>> {
        Ok(self.unresolved.lock().await.values().cloned().collect())
    }
}
