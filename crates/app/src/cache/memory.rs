//! In-process cache.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{CacheError, CacheNamespace, CacheStore};

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<FxHashMap<(CacheNamespace, String), Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, namespace: CacheNamespace, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(namespace, key.to_string()))
            .cloned())
    }

    async fn set(&self, namespace: CacheNamespace, key: &str, value: Value) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert((namespace, key.to_string()), value);

        Ok(())
    }

    async fn delete(&self, namespace: CacheNamespace, key: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .remove(&(namespace, key.to_string()));

        Ok(())
    }
}
