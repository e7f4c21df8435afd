//! Read-mostly schema snapshot cache.
//!
//! Readers clone an `Arc` out of the lock; refresh swaps the whole snapshot.
//! Two concurrent refreshes both load and the last write wins.

use crate::error::Result;
use crate::schema::{load_snapshot, SchemaProvider, SchemaSnapshot};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

struct CachedSnapshot {
    snapshot: Arc<SchemaSnapshot>,
    loaded_at: Instant,
}

pub struct SchemaCache {
    ttl: Duration,
    entry: RwLock<Option<CachedSnapshot>>,
}

impl SchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Fresh cached snapshot, if any.
    pub fn current(&self) -> Option<Arc<SchemaSnapshot>> {
        let guard = self.entry.read().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|c| c.loaded_at.elapsed() < self.ttl)
            .map(|c| Arc::clone(&c.snapshot))
    }

    pub async fn get_or_load(&self, provider: &dyn SchemaProvider) -> Result<Arc<SchemaSnapshot>> {
        if let Some(snapshot) = self.current() {
            debug!("Schema cache hit");
            return Ok(snapshot);
        }
        self.refresh(provider).await
    }

    /// Load a new snapshot and replace the cached one.
    pub async fn refresh(&self, provider: &dyn SchemaProvider) -> Result<Arc<SchemaSnapshot>> {
        let snapshot = Arc::new(load_snapshot(provider).await?);
        self.store(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn store(&self, snapshot: Arc<SchemaSnapshot>) {
        let mut guard = self.entry.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(CachedSnapshot {
            snapshot,
            loaded_at: Instant::now(),
        });
    }

    pub fn invalidate(&self) {
        let mut guard = self.entry.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnInfo, Relationship, TableInfo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl SchemaProvider for CountingProvider {
        async fn list_tables(&self) -> Result<Vec<TableInfo>> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![TableInfo {
                schema: "public".to_string(),
                name: format!("generation_{}", n),
                table_type: "BASE TABLE".to_string(),
                description: String::new(),
            }])
        }

        async fn table_columns(&self, _table: &str, _schema: &str) -> Result<Vec<ColumnInfo>> {
            Ok(Vec::new())
        }

        async fn relationships(&self) -> Result<Vec<Relationship>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_cache_hit_avoids_reload() {
        let provider = CountingProvider { loads: AtomicUsize::new(0) };
        let cache = SchemaCache::new(Duration::from_secs(60));

        let first = cache.get_or_load(&provider).await.unwrap();
        let second = cache.get_or_load(&provider).await.unwrap();

        assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_invalidate_and_zero_ttl_force_reload() {
        let provider = CountingProvider { loads: AtomicUsize::new(0) };
        let cache = SchemaCache::new(Duration::from_secs(60));
        cache.get_or_load(&provider).await.unwrap();
        cache.invalidate();
        let reloaded = cache.get_or_load(&provider).await.unwrap();
        assert_eq!(reloaded.tables[0].name, "generation_1");

        let expired = SchemaCache::new(Duration::ZERO);
        expired.get_or_load(&provider).await.unwrap();
        assert!(expired.current().is_none());
    }
}
