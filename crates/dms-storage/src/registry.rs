//! Content store registry, routing operations to the backend named by a
//! reference's discriminator.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::info;

use dms_core::config::content::ContentConfig;
use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::traits::ContentStore;
use dms_core::types::{ContentRef, SaveType};

use crate::providers::{DatabaseContentStore, LocalContentStore};

/// Central registry holding one store per [`SaveType`].
#[derive(Debug, Clone, Default)]
pub struct ContentStoreRegistry {
    /// Map of save type → store instance.
    stores: Arc<RwLock<HashMap<SaveType, Arc<dyn ContentStore>>>>,
}

impl ContentStoreRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with both built-in backends from configuration.
    pub async fn from_config(config: &ContentConfig) -> AppResult<Self> {
        let registry = Self::new();
        registry
            .register(Arc::new(DatabaseContentStore::new()))
            .await;
        registry
            .register(Arc::new(LocalContentStore::new(&config.local.root_path).await?))
            .await;
        info!(root = %config.local.root_path, "Content stores initialized");
        Ok(registry)
    }

    /// Register a store under its own save type, replacing any previous one.
    pub async fn register(&self, store: Arc<dyn ContentStore>) {
        let mut stores = self.stores.write().await;
        stores.insert(store.save_type(), store);
    }

    /// Get the store for a save type.
    pub async fn get(&self, save_type: SaveType) -> AppResult<Arc<dyn ContentStore>> {
        let stores = self.stores.read().await;
        stores
            .get(&save_type)
            .cloned()
            .ok_or_else(|| AppError::configuration(format!("No content store for '{save_type}'")))
    }

    /// Store bytes in the given backend.
    pub async fn put(&self, save_type: SaveType, data: Bytes) -> AppResult<ContentRef> {
        self.get(save_type).await?.put(data).await
    }

    /// Read the bytes behind a reference from whichever backend produced it.
    pub async fn read(&self, content: &ContentRef) -> AppResult<Bytes> {
        self.get(content.backend).await?.get(content).await
    }

    /// Delete the bytes behind a reference.
    pub async fn delete(&self, content: &ContentRef) -> AppResult<()> {
        self.get(content.backend).await?.delete(content).await
    }

    /// Whether the bytes behind a reference are present.
    pub async fn contains(&self, content: &ContentRef) -> AppResult<bool> {
        self.get(content.backend).await?.contains(content).await
    }

    /// Check health of all registered stores.
    pub async fn health_check_all(&self) -> HashMap<SaveType, bool> {
        let stores = self.stores.read().await;
        let mut results = HashMap::new();
        for (save_type, store) in stores.iter() {
            let healthy = store.health_check().await.unwrap_or(false);
            results.insert(*save_type, healthy);
        }
        results
    }
}
