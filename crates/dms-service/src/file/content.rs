//! File content I/O.
//!
//! A write runs in three steps: validate and lock the file, put the bytes
//! into the storage's backend with no tree guard held, then swap the
//! content reference under the write guard and recompute. The replaced
//! reference is deleted last, best effort.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use tracing::info;

use dms_core::error::AppError;
use dms_core::events::ChangeKind;
use dms_core::types::{FileId, NodeRef, SaveType, UserId};
use dms_entity::{ContentInfo, File, Permission};
use dms_storage::ContentDigest;

use crate::context::RequestContext;
use crate::deps::ServiceDeps;
use crate::lock::Operation;
use crate::recompute::{DerivedField, FieldSet};

/// Put bytes into a backend and capture their digest.
pub(crate) async fn store_content(deps: &ServiceDeps, save_type: SaveType, data: Bytes) -> Result<ContentInfo, AppError> {
    let digest = ContentDigest::of(&data);
    let content_ref = deps.content.put(save_type, data).await?;
    Ok(ContentInfo {
        content_ref,
        size: digest.size,
        checksum: digest.checksum,
        detected_mimetype: digest.detected_mimetype,
    })
}

/// Reads and writes file content.
#[derive(Debug, Clone)]
pub struct ContentService {
    deps: ServiceDeps,
}

impl ContentService {
    /// Creates a new content service.
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    /// Reads a file's content. A file that was never written reads as
    /// empty.
    pub async fn read_content(&self, ctx: &RequestContext, id: FileId) -> Result<Bytes, AppError> {
        let content_ref = {
            let tree = self.deps.repo.read().await;
            self.deps
                .require(ctx, &tree, NodeRef::File(id), Permission::Read)?;
            tree.file(id)?
                .content
                .as_ref()
                .map(|c| c.content_ref.clone())
        };
        match content_ref {
            Some(content_ref) => self
                .deps
                .content
                .read(&content_ref)
                .await
                .map_err(|e| e.for_node(NodeRef::File(id))),
            None => Ok(Bytes::new()),
        }
    }

    /// Replaces a file's content.
    pub async fn write_content(&self, ctx: &RequestContext, id: FileId, data: Bytes) -> Result<File, AppError> {
        self.deps.policy.check_size(&data)?;
        let op = self.deps.locks.begin(ctx);
        let save_type = self.prepare_write(Some(ctx), &op, id).await?;
        let content = store_content(&self.deps, save_type, data).await?;
        self.replace_content(Some(ctx.user_id), &op, id, Some(content))
            .await
    }

    /// Replaces a file's content from a base64 string. The size limit
    /// applies to the decoded bytes.
    pub async fn write_content_base64(&self, ctx: &RequestContext, id: FileId, encoded: &str) -> Result<File, AppError> {
        let data = STANDARD.decode(encoded.trim())?;
        self.write_content(ctx, id, Bytes::from(data)).await
    }

    /// Drops a file's content. Size becomes 0 and the checksum is cleared.
    pub async fn clear_content(&self, ctx: &RequestContext, id: FileId) -> Result<File, AppError> {
        let op = self.deps.locks.begin(ctx);
        self.prepare_write(Some(ctx), &op, id).await?;
        self.replace_content(Some(ctx.user_id), &op, id, None).await
    }

    /// Writes on behalf of the holder of a checkout lock. Write permission
    /// was verified when the lock was issued.
    pub(crate) async fn write_checked_out(&self, user: UserId, id: FileId, data: Bytes) -> Result<File, AppError> {
        self.deps.policy.check_size(&data)?;
        let op = self.deps.locks.begin(&RequestContext::new(user));
        let save_type = self.prepare_write(None, &op, id).await?;
        let content = store_content(&self.deps, save_type, data).await?;
        self.replace_content(Some(user), &op, id, Some(content))
            .await
    }

    /// Check permission and policy, then lock the file for `op`. Returns
    /// the backend new content goes to.
    async fn prepare_write(&self, ctx: Option<&RequestContext>, op: &Operation, id: FileId) -> Result<SaveType, AppError> {
        let node = NodeRef::File(id);
        let tree = self.deps.repo.read().await;
        match ctx {
            Some(ctx) => self.deps.require(ctx, &tree, node, Permission::Write)?,
            None => tree.ensure_exists(node)?,
        }
        self.deps.policy.check_extension(tree.file(id)?.name())?;
        self.deps.locks.guard(node, op.holder(), op.id())?;
        Ok(tree.storage_of(node)?.save_type)
    }

    /// Swap the content reference and recompute. A replaced reference is
    /// deleted after the guard is released.
    async fn replace_content(
        &self,
        actor: Option<UserId>,
        op: &Operation,
        id: FileId,
        content: Option<ContentInfo>,
    ) -> Result<File, AppError> {
        let node = NodeRef::File(id);
        let new_ref = content.as_ref().map(|c| c.content_ref.clone());

        let mut tree = self.deps.repo.write().await;
        if let Err(e) = tree.ensure_exists(node) {
            drop(tree);
            self.deps.discard_content(new_ref).await;
            return Err(e);
        }
        let file = tree.file_mut(id)?;
        let updated_at = file.node.updated_at;
        let old = std::mem::replace(&mut file.content, content);
        file.node.touch();
        let wanted = FieldSet::from(DerivedField::CONTENT);
        let changes = match self.deps.engine.trigger_computation(&mut tree, node, &wanted) {
            Ok(changes) => changes,
            Err(e) => {
                let file = tree.file_mut(id)?;
                file.content = old;
                file.node.updated_at = updated_at;
                self.deps.engine.restore(&mut tree, node, &wanted);
                drop(tree);
                self.deps.discard_content(new_ref).await;
                return Err(e);
            }
        };
        let updated = tree.file(id)?.clone();
        drop(tree);

        let replaced = old
            .map(|c| c.content_ref)
            .filter(|old| Some(old) != new_ref.as_ref());
        self.deps.discard_content(replaced).await;

        info!(
            user_id = ?actor,
            file_id = %id,
            size = updated.size,
            operation_id = %op.id(),
            "File content written"
        );
        self.deps.notifier.publish(
            node,
            ChangeKind::ContentWritten,
            &["content"],
            changes,
            actor,
            Some(op.id()),
        );
        Ok(updated)
    }
}
