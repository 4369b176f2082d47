/// Storage
///
/// Async key-value persistence for keys and session state. Values are stored
/// as JSON strings under `<wallet name>:<namespace>:<key>`.
///
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};

use crate::error::Result;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: String) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.items.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.read().await.keys().cloned().collect())
    }
}

/// Keeps every item in one JSON object on disk, rewritten on each change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(items)?).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.read_all().await?;
        items.insert(key.to_string(), value);
        self.write_all(&items).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.read_all().await?;
        if items.remove(key).is_some() {
            self.write_all(&items).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.into_keys().collect())
    }
}

/// A namespaced view over a shared backend.
#[derive(Clone)]
pub struct ScopedStorage {
    backend: Arc<dyn Storage>,
    prefix: String,
}

impl ScopedStorage {
    pub fn new(backend: Arc<dyn Storage>, scope: &str, namespace: &str) -> Self {
        Self {
            backend,
            prefix: format!("{scope}:{namespace}:"),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    pub async fn load_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.backend
            .get_item(&self.scoped(key))
            .await?
            .map(|raw| serde_json::from_str(&raw).map_err(Into::into))
            .transpose()
    }

    pub async fn store_object<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.backend
            .set_item(&self.scoped(key), serde_json::to_string(value)?)
            .await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove_item(&self.scoped(key)).await
    }

    /// Removes every key in this namespace.
    pub async fn clear(&self) -> Result<()> {
        for key in self.backend.keys().await? {
            if key.starts_with(&self.prefix) {
                self.backend.remove_item(&key).await?;
            }
        }
        debug!("cleared storage scope {}", self.prefix);
        Ok(())
    }
}
