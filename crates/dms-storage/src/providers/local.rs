//! Local filesystem content store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use dms_core::error::{AppError, ErrorKind};
use dms_core::result::AppResult;
use dms_core::traits::ContentStore;
use dms_core::types::{ContentRef, SaveType};

/// Stores each blob as a file under a root directory, sharded by the
/// first two hex characters of its key.
#[derive(Debug, Clone)]
pub struct LocalContentStore {
    /// Root directory for all stored content.
    root: PathBuf,
}

impl LocalContentStore {
    /// Create a new local store rooted at the given path.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create content root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve a key to an absolute path within the root.
    fn resolve(&self, content: &ContentRef) -> AppResult<PathBuf> {
        if content.backend != SaveType::File {
            return Err(AppError::internal(format!(
                "Reference {content} does not belong to the file store"
            )));
        }
        let key = content.key.as_str();
        let valid = !key.is_empty()
            && !key.starts_with('/')
            && key
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != "..");
        if !valid {
            return Err(AppError::validation(format!("Invalid content key: {key}")));
        }
        Ok(self.root.join(key))
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    fn save_type(&self) -> SaveType {
        SaveType::File
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.root.exists() && self.root.is_dir())
    }

    async fn put(&self, data: Bytes) -> AppResult<ContentRef> {
        let id = Uuid::new_v4().simple().to_string();
        let content = ContentRef::new(SaveType::File, format!("{}/{}", &id[..2], &id[2..]));
        let full_path = self.resolve(&content)?;
        self.ensure_parent(&full_path).await?;

        // write under a temporary name so readers never see a partial blob
        let tmp_path = full_path.with_extension("part");
        fs::write(&tmp_path, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write content: {content}"),
                e,
            )
        })?;
        fs::rename(&tmp_path, &full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to finalize content: {content}"),
                e,
            )
        })?;

        debug!(key = %content.key, bytes = data.len(), "Wrote content file");
        Ok(content)
    }

    async fn get(&self, content: &ContentRef) -> AppResult<Bytes> {
        let full_path = self.resolve(content)?;
        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Content not found: {content}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read content: {content}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, content: &ContentRef) -> AppResult<()> {
        let full_path = self.resolve(content)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete content: {content}"),
                e,
            )),
        }
    }

    async fn contains(&self, content: &ContentRef) -> AppResult<bool> {
        if content.backend != SaveType::File {
            return Ok(false);
        }
        let full_path = self.resolve(content)?;
        Ok(fs::try_exists(&full_path).await.unwrap_or(false))
    }
}
