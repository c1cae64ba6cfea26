//! Operation scope that releases its locks when dropped.

use std::sync::Arc;

use tracing::debug;

use dms_core::types::OperationId;
use dms_entity::lock::LockHolder;

use super::manager::LockManager;

/// A unit of work grouping the locks it takes.
///
/// An owned operation releases every lock tagged with its ID when dropped,
/// on success and on error alike. A shared operation was started by the
/// caller, who releases it with [`LockManager::unlock_operation`].
#[derive(Debug)]
pub struct Operation {
    id: OperationId,
    holder: LockHolder,
    locks: Arc<LockManager>,
    owned: bool,
}

impl Operation {
    pub(crate) fn owned(id: OperationId, holder: LockHolder, locks: Arc<LockManager>) -> Self {
        Self {
            id,
            holder,
            locks,
            owned: true,
        }
    }

    pub(crate) fn shared(id: OperationId, holder: LockHolder, locks: Arc<LockManager>) -> Self {
        Self {
            id,
            holder,
            locks,
            owned: false,
        }
    }

    /// The operation ID stamped on every lock this operation takes.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Who the operation acts as.
    pub fn holder(&self) -> LockHolder {
        self.holder
    }

    /// Whether dropping this operation releases its locks.
    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        if self.owned {
            let released = self.locks.unlock_operation(self.id);
            if released > 0 {
                debug!(operation_id = %self.id, released, "Operation locks released");
            }
        }
    }
}
