//! The coordination store interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{Namespace, StoreError};

/// A stored record together with its bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub namespace: Namespace,
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shared, namespaced key-value store
///
/// Implementations must be safe to call from many tasks at once. Writes are
/// last-writer-wins; there are no transactions or compare-and-swap. Correctness
/// of anything built on top comes from each key having exactly one writer.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Upsert a value under `key`
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), StoreError>;

    /// Fetch a single item, `None` when absent
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, StoreError>;

    /// Remove a key; deleting an absent key is not an error
    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError>;

    /// All items directly inside `namespace`, oldest update first
    async fn search(&self, namespace: &Namespace) -> Result<Vec<Item>, StoreError>;

    /// Every namespace that currently holds at least one item
    async fn namespaces(&self) -> Result<Vec<Namespace>, StoreError>;
}

/// Shared handle used by everything that coordinates through a store
pub type StoreRef = Arc<dyn CoordinationStore>;
