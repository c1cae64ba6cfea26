//! Lock model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dms_core::types::{LockId, NodeRef, OperationId, UserId};

/// Who holds a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "user_id", rename_all = "lowercase")]
pub enum LockHolder {
    /// An end user.
    User(UserId),
    /// An internal system operation.
    System,
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::System => write!(f, "system"),
        }
    }
}

/// An exclusive claim on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    /// Unique lock identifier.
    pub id: LockId,
    /// The locked node.
    pub target: NodeRef,
    /// The holder.
    pub holder: LockHolder,
    /// Opaque bearer secret scoped to this lock.
    pub token: String,
    /// Operation grouping this lock with others, if any.
    pub operation_id: Option<OperationId>,
    /// When the lock was taken.
    pub created_at: DateTime<Utc>,
}

impl Lock {
    /// Whether this lock belongs to the given operation.
    pub fn belongs_to(&self, operation_id: OperationId) -> bool {
        self.operation_id == Some(operation_id)
    }

    /// Whether `holder`, acting in `operation_id`, may pass this lock:
    /// either the lock belongs to that operation, or it is the same end
    /// user's own lock taken outside any operation.
    pub fn admits(&self, holder: LockHolder, operation_id: OperationId) -> bool {
        if self.belongs_to(operation_id) {
            return true;
        }
        self.operation_id.is_none() && matches!(holder, LockHolder::User(_)) && self.holder == holder
    }
}

/// Lock status of a node as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LockState {
    /// No lock exists.
    Unlocked,
    /// A lock exists.
    Locked {
        /// The holder.
        holder: LockHolder,
        /// The owning operation.
        operation_id: Option<OperationId>,
    },
}

impl LockState {
    /// Whether a lock exists.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

impl From<Option<&Lock>> for LockState {
    fn from(lock: Option<&Lock>) -> Self {
        match lock {
            Some(lock) => Self::Locked {
                holder: lock.holder,
                operation_id: lock.operation_id,
            },
            None => Self::Unlocked,
        }
    }
}
