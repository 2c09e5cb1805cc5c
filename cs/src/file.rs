//! Store backed by one JSON file per key

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::{CoordinationStore, Item, Namespace, StoreError, validate_key};

const ITEM_EXT: &str = "json";

/// Directory-per-namespace store that several processes can share
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so readers never observe a half-written record.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open or create a store rooted at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;
        info!(?base_path, "Opened file store");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn namespace_dir(&self, namespace: &Namespace) -> PathBuf {
        namespace
            .segments()
            .iter()
            .fold(self.base_path.clone(), |path, segment| path.join(segment))
    }

    fn item_path(&self, namespace: &Namespace, key: &str) -> PathBuf {
        self.namespace_dir(namespace).join(format!("{}.{}", key, ITEM_EXT))
    }

    async fn read_item(path: &Path) -> Result<Option<Item>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CoordinationStore for FileStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), StoreError> {
        validate_key(key)?;
        debug!(%namespace, %key, "FileStore::put: called");
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).await?;

        let path = self.item_path(namespace, key);
        let now = Utc::now();
        let created_at = match Self::read_item(&path).await {
            Ok(Some(existing)) => existing.created_at,
            Ok(None) => now,
            Err(e) => {
                warn!(?path, error = %e, "FileStore::put: unreadable existing item, overwriting");
                now
            }
        };
        let item = Item {
            namespace: namespace.clone(),
            key: key.to_string(),
            value,
            created_at,
            updated_at: now,
        };

        let tmp = dir.join(format!(".{}.{}.tmp", key, Uuid::now_v7()));
        fs::write(&tmp, serde_json::to_vec_pretty(&item)?).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, StoreError> {
        validate_key(key)?;
        Self::read_item(&self.item_path(namespace, key)).await
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        debug!(%namespace, %key, "FileStore::delete: called");
        match fs::remove_file(self.item_path(namespace, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn search(&self, namespace: &Namespace) -> Result<Vec<Item>, StoreError> {
        let dir = self.namespace_dir(namespace);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_item_file(&path) {
                continue;
            }
            match Self::read_item(&path).await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(e) => warn!(?path, error = %e, "FileStore::search: skipping unreadable item"),
            }
        }
        items.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.key.cmp(&b.key)));
        Ok(items)
    }

    async fn namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        let base = self.base_path.clone();
        tokio::task::spawn_blocking(move || scan_namespaces(&base))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

fn is_item_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ITEM_EXT)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !n.starts_with('.'))
}

fn scan_namespaces(base: &Path) -> Result<Vec<Namespace>, StoreError> {
    let mut namespaces = Vec::new();
    for entry in WalkDir::new(base).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let has_items = std::fs::read_dir(entry.path())?
            .filter_map(|e| e.ok())
            .any(|e| is_item_file(&e.path()));
        if !has_items {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base) else {
            continue;
        };
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        match Namespace::new(segments) {
            Ok(ns) => namespaces.push(ns),
            Err(e) => debug!(path = ?entry.path(), error = %e, "scan_namespaces: skipping foreign directory"),
        }
    }
    Ok(namespaces)
}
