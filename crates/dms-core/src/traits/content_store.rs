//! Content store trait for pluggable byte storage backends.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;
use crate::types::{ContentRef, SaveType};

/// Trait for raw content backends.
///
/// Implementations exist for an embedded database blob table and the
/// local filesystem in `dms-storage`. Every reference a store hands out
/// carries that store's [`SaveType`] as its discriminator.
#[async_trait]
pub trait ContentStore: Send + Sync + std::fmt::Debug + 'static {
    /// The backend discriminator written into every produced reference.
    fn save_type(&self) -> SaveType;

    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Store bytes and return a fresh reference to them.
    async fn put(&self, data: Bytes) -> AppResult<ContentRef>;

    /// Read the bytes behind a reference.
    async fn get(&self, content: &ContentRef) -> AppResult<Bytes>;

    /// Delete the bytes behind a reference. Deleting a missing object is
    /// not an error.
    async fn delete(&self, content: &ContentRef) -> AppResult<()>;

    /// Whether the bytes behind a reference are present in this backend.
    async fn contains(&self, content: &ContentRef) -> AppResult<bool>;
}
