use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::database::models::ColumnInfo;

/// Per-table cache of column lists and unfiltered row counts.
///
/// Entries never expire on their own. Writers call the invalidation hooks:
/// `invalidate_counts` after row inserts/deletes and imports, `invalidate`
/// after a table is created or dropped. When disabled every lookup misses.
#[derive(Clone, Default)]
pub struct MetadataCache {
    enabled: bool,
    columns: Arc<RwLock<HashMap<String, Arc<Vec<ColumnInfo>>>>>,
    real_totals: Arc<RwLock<HashMap<String, i64>>>,
}

impl MetadataCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub async fn columns(&self, table: &str) -> Option<Arc<Vec<ColumnInfo>>> {
        if !self.enabled {
            return None;
        }
        self.columns.read().await.get(table).cloned()
    }

    pub async fn store_columns(&self, table: &str, columns: Vec<ColumnInfo>) -> Arc<Vec<ColumnInfo>> {
        let columns = Arc::new(columns);
        if self.enabled {
            self.columns.write().await.insert(table.to_string(), columns.clone());
        }
        columns
    }

    pub async fn real_total(&self, table: &str) -> Option<i64> {
        if !self.enabled {
            return None;
        }
        self.real_totals.read().await.get(table).copied()
    }

    pub async fn store_real_total(&self, table: &str, total: i64) {
        if self.enabled {
            self.real_totals.write().await.insert(table.to_string(), total);
        }
    }

    /// Row counts changed; column shape did not
    pub async fn invalidate_counts(&self, table: &str) {
        if self.real_totals.write().await.remove(table).is_some() {
            debug!("Invalidated cached row count for {}", table);
        }
    }

    /// Table created, altered or dropped
    pub async fn invalidate(&self, table: &str) {
        self.columns.write().await.remove(table);
        self.real_totals.write().await.remove(table);
        debug!("Invalidated cached metadata for {}", table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: "TEXT".to_string(),
            nullable: true,
            key: String::new(),
            default: None,
            extra: String::new(),
        }
    }

    #[tokio::test]
    async fn stores_and_invalidates() {
        let cache = MetadataCache::new(true);
        cache.store_columns("orders", vec![column("name")]).await;
        cache.store_real_total("orders", 42).await;

        assert_eq!(cache.columns("orders").await.unwrap().len(), 1);
        assert_eq!(cache.real_total("orders").await, Some(42));

        cache.invalidate_counts("orders").await;
        assert_eq!(cache.real_total("orders").await, None);
        assert!(cache.columns("orders").await.is_some());

        cache.invalidate("orders").await;
        assert!(cache.columns("orders").await.is_none());
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = MetadataCache::new(false);
        let stored = cache.store_columns("orders", vec![column("name")]).await;
        assert_eq!(stored.len(), 1);
        cache.store_real_total("orders", 1).await;
        assert!(cache.columns("orders").await.is_none());
        assert!(cache.real_total("orders").await.is_none());
    }
}
