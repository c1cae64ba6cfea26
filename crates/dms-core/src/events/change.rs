//! Node change events.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{NodeKind, NodeRef, OperationId, UserId};

/// What happened to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The node was created (including as part of a copy).
    Created,
    /// The node was renamed.
    Renamed,
    /// The node was moved under a new parent.
    Moved,
    /// The node was deleted.
    Deleted,
    /// File content was written or cleared.
    ContentWritten,
    /// Metadata (color, tags, category, access groups) changed.
    MetadataUpdated,
    /// Derived fields changed as a side effect of another node's mutation.
    Recomputed,
    /// File content moved to a different backend.
    Migrated,
    /// An end-user lock was taken.
    Locked,
    /// An end-user lock was released.
    Unlocked,
}

/// A single change notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// The node that changed.
    pub node: NodeRef,
    /// What happened.
    pub change: ChangeKind,
    /// Names of the fields that changed.
    pub changed_fields: BTreeSet<String>,
    /// The user who caused the change, `None` for system operations.
    pub actor: Option<UserId>,
    /// The operation that produced the change.
    pub operation_id: Option<OperationId>,
    /// When the change was applied.
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(
        node: NodeRef,
        change: ChangeKind,
        changed_fields: impl IntoIterator<Item = impl Into<String>>,
        actor: Option<UserId>,
        operation_id: Option<OperationId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            node,
            change,
            changed_fields: changed_fields.into_iter().map(Into::into).collect(),
            actor,
            operation_id,
            timestamp: Utc::now(),
        }
    }

    /// The kind of node that changed.
    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }
}
