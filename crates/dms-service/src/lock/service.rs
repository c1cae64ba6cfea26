//! End-user lock surface: explicit locks and checkout/checkin.

use bytes::Bytes;
use tracing::info;

use dms_core::error::AppError;
use dms_core::events::{ChangeEvent, ChangeKind};
use dms_core::types::{FileId, NodeRef};
use dms_entity::lock::{Lock, LockHolder, LockState};
use dms_entity::{File, Permission};

use crate::context::RequestContext;
use crate::deps::ServiceDeps;
use crate::file::ContentService;

/// Explicit locks taken and released by end users.
#[derive(Debug, Clone)]
pub struct LockService {
    deps: ServiceDeps,
    content: ContentService,
}

impl LockService {
    /// Creates a new lock service.
    pub fn new(deps: ServiceDeps, content: ContentService) -> Self {
        Self { deps, content }
    }

    /// Lock a node for exclusive editing. Requires `write`.
    pub async fn lock_node(&self, ctx: &RequestContext, node: NodeRef) -> Result<Lock, AppError> {
        {
            let tree = self.deps.repo.read().await;
            self.deps.require(ctx, &tree, node, Permission::Write)?;
        }
        let lock = self.deps.locks.user_lock(node, ctx.user_id)?;
        self.notify(node, ChangeKind::Locked, ctx);
        Ok(lock)
    }

    /// Release the actor's own lock on a node.
    pub async fn unlock_node(&self, ctx: &RequestContext, node: NodeRef) -> Result<(), AppError> {
        {
            let tree = self.deps.repo.read().await;
            tree.ensure_exists(node)?;
        }
        if self.deps.locks.user_unlock(node, ctx.user_id)?.is_some() {
            self.notify(node, ChangeKind::Unlocked, ctx);
        }
        Ok(())
    }

    /// Lock status of a node. Requires `read`.
    pub async fn lock_state(&self, ctx: &RequestContext, node: NodeRef) -> Result<LockState, AppError> {
        let tree = self.deps.repo.read().await;
        self.deps.require(ctx, &tree, node, Permission::Read)?;
        Ok(self.deps.locks.lock_state(node))
    }

    /// Check a file out for editing and return the bearer token that
    /// checks it back in.
    pub async fn checkout(&self, ctx: &RequestContext, id: FileId) -> Result<String, AppError> {
        let lock = self.lock_node(ctx, NodeRef::File(id)).await?;
        info!(user_id = %ctx.user_id, file_id = %id, "File checked out");
        Ok(lock.token)
    }

    /// Upload new content for a checked-out file and release its lock.
    pub async fn checkin(&self, token: &str, data: Bytes) -> Result<File, AppError> {
        let lock = self
            .deps
            .locks
            .find_by_token(token)
            .ok_or_else(|| AppError::access("Lock token is invalid or has been released"))?;
        let (NodeRef::File(id), LockHolder::User(user), None) = (lock.target, lock.holder, lock.operation_id) else {
            return Err(AppError::validation("Lock token does not belong to a file checkout")
                .for_node(lock.target));
        };

        let file = self.content.write_checked_out(user, id, data).await?;
        let ctx = RequestContext::new(user);
        if self.deps.locks.user_unlock(lock.target, user)?.is_some() {
            self.notify(lock.target, ChangeKind::Unlocked, &ctx);
        }
        info!(user_id = %user, file_id = %id, size = file.size, "File checked in");
        Ok(file)
    }

    fn notify(&self, node: NodeRef, change: ChangeKind, ctx: &RequestContext) {
        self.deps.notifier.notify(ChangeEvent::new(
            node,
            change,
            ["lock"],
            Some(ctx.user_id),
            ctx.operation_id,
        ));
    }
}
