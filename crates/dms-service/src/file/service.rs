//! File CRUD operations.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

use dms_core::error::AppError;
use dms_core::events::ChangeKind;
use dms_core::types::{DirectoryId, FileId, NodeRef};
use dms_entity::{ContentInfo, File, NodeInfo, Permission};

use crate::context::RequestContext;
use crate::deps::ServiceDeps;
use crate::directory::tree::{PlannedFile, duplicate_content};
use crate::lock::Operation;
use crate::naming::{unique_name, validate_name};
use crate::recompute::{ChangeSet, DerivedField, FieldSet};
use crate::repository::{Placement, TreeState};

use super::content::store_content;

/// Request to create a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileRequest {
    /// Owning directory.
    pub directory_id: DirectoryId,
    /// File name. Made unique among siblings, keeping the extension.
    pub name: String,
    /// Initial content. Without it the file starts empty and gets a
    /// content reference on first write.
    #[serde(skip)]
    pub content: Option<Bytes>,
}

impl CreateFileRequest {
    pub fn new(directory_id: DirectoryId, name: impl Into<String>) -> Self {
        Self {
            directory_id,
            name: name.into(),
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Manages files.
#[derive(Debug, Clone)]
pub struct FileService {
    deps: ServiceDeps,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    /// Gets a file by ID.
    pub async fn get_file(&self, ctx: &RequestContext, id: FileId) -> Result<File, AppError> {
        let tree = self.deps.repo.read().await;
        self.deps
            .require(ctx, &tree, NodeRef::File(id), Permission::Read)?;
        Ok(tree.file(id)?.clone())
    }

    /// Creates a file, optionally with content.
    pub async fn create_file(&self, ctx: &RequestContext, req: CreateFileRequest) -> Result<File, AppError> {
        validate_name(&req.name)?;
        self.deps.policy.check_extension(&req.name)?;
        if let Some(data) = &req.content {
            self.deps.policy.check_size(data)?;
        }
        let parent = NodeRef::Directory(req.directory_id);

        let save_type = {
            let tree = self.deps.repo.read().await;
            self.deps.require(ctx, &tree, parent, Permission::Create)?;
            tree.storage_of(parent)?.save_type
        };
        let content = match req.content {
            Some(data) => Some(store_content(&self.deps, save_type, data).await?),
            None => None,
        };

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        let inserted = self.insert_file(ctx, &op, &mut tree, req.directory_id, &req.name, content.clone());
        let (file, changes) = match inserted {
            Ok(result) => result,
            Err(e) => {
                drop(tree);
                self.deps
                    .discard_content(content.map(|c| c.content_ref))
                    .await;
                return Err(e);
            }
        };
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            file_id = %file.id,
            path = %file.path(),
            size = file.size,
            "File created"
        );
        self.deps
            .notifier
            .publish_created(&[file.node_ref()], changes, Some(ctx.user_id), Some(op.id()));
        Ok(file)
    }

    fn insert_file(
        &self,
        ctx: &RequestContext,
        op: &Operation,
        tree: &mut TreeState,
        directory_id: DirectoryId,
        requested_name: &str,
        content: Option<ContentInfo>,
    ) -> Result<(File, ChangeSet), AppError> {
        let parent = NodeRef::Directory(directory_id);
        self.deps.require(ctx, tree, parent, Permission::Create)?;
        self.deps.ensure_unlocked(op, parent)?;

        let name = unique_name(
            requested_name,
            &tree.sibling_names(Placement::Directory(directory_id), None)?,
            true,
        );
        let storage_id = tree.directory(directory_id)?.storage_id;
        let mut file = File::new(NodeInfo::new(name, Some(ctx.user_id)), directory_id, storage_id);
        file.content = content;
        let id = file.id;
        tree.insert_file(file)?;
        let changes = self
            .deps
            .engine
            .settle_inserted(tree, &[NodeRef::File(id)])?;
        Ok((tree.file(id)?.clone(), changes))
    }

    /// Renames a file. Fails when a sibling already uses the name.
    pub async fn rename_file(&self, ctx: &RequestContext, id: FileId, new_name: &str) -> Result<File, AppError> {
        validate_name(new_name)?;
        self.deps.policy.check_extension(new_name)?;
        let node = NodeRef::File(id);

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        self.deps.require(ctx, &tree, node, Permission::Write)?;
        if tree.file(id)?.name() == new_name {
            return Ok(tree.file(id)?.clone());
        }
        let placement = tree.placement_of(node)?;
        tree.ensure_name_free(placement, new_name, Some(node))?;
        self.deps.locks.guard(node, op.holder(), op.id())?;

        let file = tree.file_mut(id)?;
        let updated_at = file.node.updated_at;
        let old_name = std::mem::replace(&mut file.node.name, new_name.to_string());
        file.node.touch();
        let wanted = FieldSet::from([DerivedField::Path, DerivedField::Extension, DerivedField::Mimetype]);
        let changes = match self.deps.engine.trigger_computation(&mut tree, node, &wanted) {
            Ok(changes) => changes,
            Err(e) => {
                let file = tree.file_mut(id)?;
                file.node.name = old_name;
                file.node.updated_at = updated_at;
                self.deps.engine.restore(&mut tree, node, &wanted);
                return Err(e);
            }
        };
        let renamed = tree.file(id)?.clone();
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            file_id = %id,
            old_name = %old_name,
            new_name = %new_name,
            "File renamed"
        );
        self.deps.notifier.publish(
            node,
            ChangeKind::Renamed,
            &["name"],
            changes,
            Some(ctx.user_id),
            Some(op.id()),
        );
        Ok(renamed)
    }

    /// Moves a file into another directory.
    pub async fn move_file(&self, ctx: &RequestContext, id: FileId, directory_id: DirectoryId) -> Result<File, AppError> {
        let node = NodeRef::File(id);
        let target = NodeRef::Directory(directory_id);

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        self.deps.require(ctx, &tree, node, Permission::Write)?;
        self.deps.require(ctx, &tree, target, Permission::Create)?;

        let file = tree.file(id)?;
        let old_directory = file.directory_id;
        if old_directory == directory_id {
            return Ok(file.clone());
        }
        let name = file.name().to_string();
        tree.ensure_name_free(Placement::Directory(directory_id), &name, None)?;
        self.deps.locks.guard(node, op.holder(), op.id())?;
        self.deps.ensure_unlocked(&op, target)?;

        tree.detach(node)?;
        tree.attach_file(id, directory_id)?;
        tree.file_mut(id)?.node.touch();

        let mut changes = self.deps.engine.trigger_computation(
            &mut tree,
            node,
            &FieldSet::from(DerivedField::PLACEMENT),
        )?;
        changes.merge(self.deps.engine.refresh_totals(&mut tree, old_directory)?);
        changes.merge(self.deps.engine.refresh_totals(&mut tree, directory_id)?);
        let moved = tree.file(id)?.clone();
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            file_id = %id,
            directory_id = %directory_id,
            path = %moved.path(),
            "File moved"
        );
        self.deps.notifier.publish(
            node,
            ChangeKind::Moved,
            &["directory"],
            changes,
            Some(ctx.user_id),
            Some(op.id()),
        );
        Ok(moved)
    }

    /// Copies a file into a directory with its content duplicated into the
    /// target storage's backend.
    pub async fn copy_file(&self, ctx: &RequestContext, id: FileId, directory_id: DirectoryId) -> Result<File, AppError> {
        let target = NodeRef::Directory(directory_id);
        let (save_type, mut plan) = {
            let tree = self.deps.repo.read().await;
            self.deps
                .require(ctx, &tree, NodeRef::File(id), Permission::Read)?;
            self.deps.require(ctx, &tree, target, Permission::Create)?;
            (tree.storage_of(target)?.save_type, PlannedFile::snapshot(&tree, id)?)
        };

        let mut written = Vec::new();
        if let Some(source) = plan.content.take() {
            plan.content = Some(duplicate_content(&self.deps, save_type, &source, &mut written).await?);
        }

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        let inserted = self.insert_copy(ctx, &op, &mut tree, directory_id, &plan);
        let (copy, changes) = match inserted {
            Ok(result) => result,
            Err(e) => {
                drop(tree);
                self.deps.discard_content(written).await;
                return Err(e);
            }
        };
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            source_id = %id,
            file_id = %copy.id,
            path = %copy.path(),
            "File copied"
        );
        self.deps
            .notifier
            .publish_created(&[copy.node_ref()], changes, Some(ctx.user_id), Some(op.id()));
        Ok(copy)
    }

    fn insert_copy(
        &self,
        ctx: &RequestContext,
        op: &Operation,
        tree: &mut TreeState,
        directory_id: DirectoryId,
        plan: &PlannedFile,
    ) -> Result<(File, ChangeSet), AppError> {
        let target = NodeRef::Directory(directory_id);
        self.deps.require(ctx, tree, target, Permission::Create)?;
        self.deps.ensure_unlocked(op, target)?;

        let name = unique_name(
            &plan.node.name,
            &tree.sibling_names(Placement::Directory(directory_id), None)?,
            true,
        );
        let id = plan.materialize(tree, directory_id, name, ctx.user_id)?;
        let changes = self
            .deps
            .engine
            .settle_inserted(tree, &[NodeRef::File(id)])?;
        Ok((tree.file(id)?.clone(), changes))
    }

    /// Deletes a file and its content.
    pub async fn delete_file(&self, ctx: &RequestContext, id: FileId) -> Result<(), AppError> {
        let node = NodeRef::File(id);

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        self.deps.require(ctx, &tree, node, Permission::Unlink)?;
        self.deps.locks.guard(node, op.holder(), op.id())?;

        let directory_id = tree.file(id)?.directory_id;
        let content = tree.remove_file(id)?;
        let changes = self.deps.engine.refresh_totals(&mut tree, directory_id)?;
        drop(tree);

        self.deps.locks.unlock(node);
        self.deps.discard_content(content).await;

        info!(user_id = %ctx.user_id, file_id = %id, "File deleted");
        self.deps
            .notifier
            .publish_deleted(&[node], Some(ctx.user_id), Some(op.id()));
        self.deps
            .notifier
            .publish_recomputed(changes, Some(ctx.user_id), Some(op.id()));
        Ok(())
    }
}
