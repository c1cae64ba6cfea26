//! Async access to the shared tree state.

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::tree::TreeState;

/// The tree behind a tokio read-write lock.
///
/// Structural mutations take the write guard for their metadata phase
/// only; content I/O always runs with the guard released.
#[derive(Debug, Default)]
pub struct NodeRepository {
    state: RwLock<TreeState>,
}

impl NodeRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire shared access for reads and permission checks.
    pub async fn read(&self) -> RwLockReadGuard<'_, TreeState> {
        self.state.read().await
    }

    /// Acquire exclusive access for a metadata mutation.
    pub async fn write(&self) -> RwLockWriteGuard<'_, TreeState> {
        self.state.write().await
    }
}
