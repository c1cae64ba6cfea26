//! Shared collaborators handed to every service.

use std::sync::Arc;

use tracing::warn;

use dms_auth::AccessChecker;
use dms_core::error::AppError;
use dms_core::types::{ContentRef, NodeRef};
use dms_entity::Permission;
use dms_storage::{ContentPolicy, ContentStoreRegistry};

use crate::context::RequestContext;
use crate::lock::{LockManager, Operation};
use crate::notification::ChangeNotifier;
use crate::recompute::RecomputeEngine;
use crate::repository::{NodeRepository, TreeState};

/// Everything a service needs to read and mutate the tree.
#[derive(Debug, Clone)]
pub struct ServiceDeps {
    /// Node records.
    pub repo: Arc<NodeRepository>,
    /// Lock table.
    pub locks: Arc<LockManager>,
    /// Permission evaluation.
    pub access: Arc<AccessChecker>,
    /// Content backends.
    pub content: Arc<ContentStoreRegistry>,
    /// Upload policy.
    pub policy: Arc<ContentPolicy>,
    /// Change fan-out.
    pub notifier: Arc<ChangeNotifier>,
    /// Derived-field propagation.
    pub engine: RecomputeEngine,
}

impl ServiceDeps {
    /// Whether the node's storage is visible to the actor's companies.
    pub(crate) fn is_visible(&self, ctx: &RequestContext, tree: &TreeState, node: NodeRef) -> Result<bool, AppError> {
        Ok(ctx.is_superuser || tree.storage_of(node)?.is_visible_to(&ctx.company_ids))
    }

    /// Whether the actor holds `permission` on an existing node.
    pub(crate) fn allows(
        &self,
        ctx: &RequestContext,
        tree: &TreeState,
        node: NodeRef,
        permission: Permission,
    ) -> Result<bool, AppError> {
        Ok(self.is_visible(ctx, tree, node)?
            && self
                .access
                .check_access(&ctx.principal(), tree.effective_groups(node)?, permission))
    }

    /// Fails with `NotFound` for a missing node and `AccessError` when the
    /// actor lacks `permission`.
    pub(crate) fn require(
        &self,
        ctx: &RequestContext,
        tree: &TreeState,
        node: NodeRef,
        permission: Permission,
    ) -> Result<(), AppError> {
        tree.ensure_exists(node)?;
        if !self.is_visible(ctx, tree, node)? {
            return Err(AppError::access_denied(node, permission));
        }
        self.access.require_access(
            &ctx.principal(),
            node,
            tree.effective_groups(node)?,
            permission,
        )
    }

    /// Fails when another holder's lock blocks `op` on the node.
    pub(crate) fn ensure_unlocked(&self, op: &Operation, node: NodeRef) -> Result<(), AppError> {
        self.locks
            .ensure_not_locked_by_other(node, op.holder(), op.id())
    }

    /// Delete content that is no longer referenced. Failures leave an
    /// orphaned blob behind and are only logged.
    pub(crate) async fn discard_content(&self, refs: impl IntoIterator<Item = ContentRef>) {
        for content in refs {
            if let Err(e) = self.content.delete(&content).await {
                warn!(content = %content, error = %e, "Failed to delete unreferenced content");
            }
        }
    }
}
