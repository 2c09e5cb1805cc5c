//! In-process store backed by a lock-protected map

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{CoordinationStore, Item, Namespace, StoreError, validate_key};

#[derive(Debug, Clone)]
struct Entry {
    item: Item,
    /// Write sequence number, breaks ties between equal timestamps
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<(Namespace, String), Entry>,
    next_seq: u64,
}

/// Store that lives only as long as the process
///
/// Suitable when every channel of a conversation runs in the same process,
/// which is the default for the coordinator and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items across all namespaces
    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), StoreError> {
        validate_key(key)?;
        debug!(%namespace, %key, "MemoryStore::put: called");
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let map_key = (namespace.clone(), key.to_string());
        let created_at = inner
            .items
            .get(&map_key)
            .map(|e| e.item.created_at)
            .unwrap_or(now);
        inner.items.insert(
            map_key,
            Entry {
                item: Item {
                    namespace: namespace.clone(),
                    key: key.to_string(),
                    value,
                    created_at,
                    updated_at: now,
                },
                seq,
            },
        );
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, StoreError> {
        validate_key(key)?;
        let inner = self.inner.read().await;
        Ok(inner
            .items
            .get(&(namespace.clone(), key.to_string()))
            .map(|e| e.item.clone()))
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        debug!(%namespace, %key, "MemoryStore::delete: called");
        self.inner
            .write()
            .await
            .items
            .remove(&(namespace.clone(), key.to_string()));
        Ok(())
    }

    async fn search(&self, namespace: &Namespace) -> Result<Vec<Item>, StoreError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&Entry> = inner
            .items
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, e)| e)
            .collect();
        entries.sort_by_key(|e| e.seq);
        Ok(entries.into_iter().map(|e| e.item.clone()).collect())
    }

    async fn namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        let inner = self.inner.read().await;
        let set: BTreeSet<Namespace> = inner.items.keys().map(|(ns, _)| ns.clone()).collect();
        Ok(set.into_iter().collect())
    }
}
