//! Embedded database blob store.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::traits::ContentStore;
use dms_core::types::{ContentRef, SaveType};

/// Blob table keyed by a random UUID, kept alongside the metadata.
#[derive(Debug, Clone, Default)]
pub struct DatabaseContentStore {
    /// Key → blob.
    blobs: Arc<DashMap<String, Bytes>>,
}

impl DatabaseContentStore {
    /// Create an empty blob table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    fn check_backend(content: &ContentRef) -> AppResult<()> {
        if content.backend != SaveType::Database {
            return Err(AppError::internal(format!(
                "Reference {content} does not belong to the database store"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for DatabaseContentStore {
    fn save_type(&self) -> SaveType {
        SaveType::Database
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn put(&self, data: Bytes) -> AppResult<ContentRef> {
        let key = Uuid::new_v4().simple().to_string();
        debug!(key = %key, bytes = data.len(), "Stored database blob");
        self.blobs.insert(key.clone(), data);
        Ok(ContentRef::new(SaveType::Database, key))
    }

    async fn get(&self, content: &ContentRef) -> AppResult<Bytes> {
        Self::check_backend(content)?;
        self.blobs
            .get(&content.key)
            .map(|blob| blob.value().clone())
            .ok_or_else(|| AppError::not_found(format!("Content not found: {content}")))
    }

    async fn delete(&self, content: &ContentRef) -> AppResult<()> {
        Self::check_backend(content)?;
        self.blobs.remove(&content.key);
        Ok(())
    }

    async fn contains(&self, content: &ContentRef) -> AppResult<bool> {
        Ok(content.backend == SaveType::Database && self.blobs.contains_key(&content.key))
    }
}
