//! Directory CRUD operations with access and lock enforcement.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use dms_core::error::AppError;
use dms_core::events::ChangeKind;
use dms_core::types::{AccessGroupId, DirectoryId, NodeRef, StorageId};
use dms_entity::{AccessPolicy, Directory, File, NodeInfo, Permission};

use crate::context::RequestContext;
use crate::deps::ServiceDeps;
use crate::lock::Operation;
use crate::naming::{unique_name, validate_name};
use crate::recompute::{ChangeSet, DerivedField, FieldSet};
use crate::repository::{Placement, TreeState};

use super::tree::{PlannedDirectory, duplicate_plan_content};

/// Request to create a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDirectoryRequest {
    /// Directory name. Made unique among siblings.
    pub name: String,
    /// Whether the directory is a storage root.
    pub is_root: bool,
    /// Parent directory, for non-root directories.
    pub parent_id: Option<DirectoryId>,
    /// Storage to bind, for root directories.
    pub storage_id: Option<StorageId>,
    /// Explicitly attached access groups.
    #[serde(default)]
    pub access_group_ids: BTreeSet<AccessGroupId>,
    /// Whether the parent's effective groups apply too.
    #[serde(default = "default_inherit")]
    pub inherit_access_groups: bool,
}

fn default_inherit() -> bool {
    true
}

impl CreateDirectoryRequest {
    /// A root directory bound to a storage.
    pub fn root(storage_id: StorageId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_root: true,
            parent_id: None,
            storage_id: Some(storage_id),
            access_group_ids: BTreeSet::new(),
            inherit_access_groups: true,
        }
    }

    /// A directory below a parent.
    pub fn child(parent_id: DirectoryId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_root: false,
            parent_id: Some(parent_id),
            storage_id: None,
            access_group_ids: BTreeSet::new(),
            inherit_access_groups: true,
        }
    }

    /// Attach access groups.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = AccessGroupId>) -> Self {
        self.access_group_ids = groups.into_iter().collect();
        self
    }
}

/// Where a directory copy goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum CopyTarget {
    /// Below an existing directory.
    Directory(DirectoryId),
    /// As a new root of a storage.
    Storage(StorageId),
}

/// The readable children of a directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// Child directories, by name.
    pub directories: Vec<Directory>,
    /// Child files, by name.
    pub files: Vec<File>,
}

/// One ancestor in a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Directory ID.
    pub id: DirectoryId,
    /// Directory name.
    pub name: String,
}

/// Manages directories.
#[derive(Debug, Clone)]
pub struct DirectoryService {
    deps: ServiceDeps,
}

impl DirectoryService {
    /// Creates a new directory service.
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    /// Gets a directory by ID.
    pub async fn get_directory(&self, ctx: &RequestContext, id: DirectoryId) -> Result<Directory, AppError> {
        let tree = self.deps.repo.read().await;
        self.deps
            .require(ctx, &tree, NodeRef::Directory(id), Permission::Read)?;
        Ok(tree.directory(id)?.clone())
    }

    /// Lists the child directories and files the actor may read.
    pub async fn list_children(&self, ctx: &RequestContext, id: DirectoryId) -> Result<DirectoryListing, AppError> {
        let tree = self.deps.repo.read().await;
        self.deps
            .require(ctx, &tree, NodeRef::Directory(id), Permission::Read)?;
        let grants = self.deps.access.grants_for(&ctx.principal());
        let dir = tree.directory(id)?;

        let mut directories = Vec::with_capacity(dir.child_directory_ids.len());
        for child in &dir.child_directory_ids {
            let child = tree.directory(*child)?;
            if grants.allows(&child.access.effective, Permission::Read) {
                directories.push(child.clone());
            }
        }
        let mut files = Vec::with_capacity(dir.file_ids.len());
        for file in &dir.file_ids {
            let file = tree.file(*file)?;
            if grants.allows(&file.access_group_ids, Permission::Read) {
                files.push(file.clone());
            }
        }
        directories.sort_by(|a, b| a.name().cmp(b.name()));
        files.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(DirectoryListing { directories, files })
    }

    /// Lists readable root directories across visible storages. Roots of
    /// hidden storages are included for superusers or on request.
    pub async fn list_root_directories(
        &self,
        ctx: &RequestContext,
        include_hidden: bool,
    ) -> Result<Vec<Directory>, AppError> {
        let tree = self.deps.repo.read().await;
        let grants = self.deps.access.grants_for(&ctx.principal());

        let mut roots = Vec::new();
        for storage in tree.storages.values() {
            if !ctx.is_superuser && !storage.is_visible_to(&ctx.company_ids) {
                continue;
            }
            if storage.is_hidden && !include_hidden && !ctx.is_superuser {
                continue;
            }
            for id in &storage.root_directory_ids {
                let root = tree.directory(*id)?;
                if grants.allows(&root.access.effective, Permission::Read) {
                    roots.push(root.clone());
                }
            }
        }
        roots.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(roots)
    }

    /// Resolves a materialized path within a storage.
    pub async fn find_by_path(
        &self,
        ctx: &RequestContext,
        storage_id: StorageId,
        path: &str,
    ) -> Result<NodeRef, AppError> {
        let tree = self.deps.repo.read().await;
        let node = tree.find_by_path(storage_id, path)?;
        self.deps.require(ctx, &tree, node, Permission::Read)?;
        Ok(node)
    }

    /// Ancestors of a node, root first.
    pub async fn breadcrumbs(&self, ctx: &RequestContext, node: NodeRef) -> Result<Vec<Breadcrumb>, AppError> {
        let tree = self.deps.repo.read().await;
        self.deps.require(ctx, &tree, node, Permission::Read)?;

        let mut chain = match node {
            NodeRef::Directory(id) => tree.ancestors(id)?,
            NodeRef::File(id) => {
                let dir = tree.file(id)?.directory_id;
                let mut chain = vec![dir];
                chain.extend(tree.ancestors(dir)?);
                chain
            }
        };
        chain.reverse();
        chain
            .into_iter()
            .map(|id| {
                Ok(Breadcrumb {
                    id,
                    name: tree.directory(id)?.name().to_string(),
                })
            })
            .collect()
    }

    /// Creates a directory. Roots need a superuser; other directories need
    /// `create` on the parent.
    pub async fn create_directory(
        &self,
        ctx: &RequestContext,
        req: CreateDirectoryRequest,
    ) -> Result<Directory, AppError> {
        validate_name(&req.name)?;

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;

        let placement = match (req.is_root, req.parent_id, req.storage_id) {
            (true, Some(_), _) => {
                return Err(AppError::validation(
                    "A root directory cannot have a parent directory",
                ));
            }
            (true, None, None) => {
                return Err(AppError::validation("A root directory requires a storage"));
            }
            (true, None, Some(storage_id)) => {
                if !ctx.is_superuser {
                    return Err(AppError::access(
                        "Only superusers can create root directories",
                    ));
                }
                tree.storage(storage_id)?;
                Placement::Storage(storage_id)
            }
            (false, Some(_), Some(_)) => {
                return Err(AppError::validation(
                    "Only root directories are bound to a storage",
                ));
            }
            (false, None, _) => {
                return Err(AppError::validation(
                    "A directory requires a parent unless it is a root",
                ));
            }
            (false, Some(parent_id), None) => {
                let parent = NodeRef::Directory(parent_id);
                self.deps.require(ctx, &tree, parent, Permission::Create)?;
                self.deps.ensure_unlocked(&op, parent)?;
                Placement::Directory(parent_id)
            }
        };
        self.deps
            .access
            .registry()
            .ensure_all_exist(&req.access_group_ids)?;

        let name = unique_name(&req.name, &tree.sibling_names(placement, None)?, false);
        let node = NodeInfo::new(name, Some(ctx.user_id));
        let access = AccessPolicy {
            explicit: req.access_group_ids,
            inherit: req.inherit_access_groups,
            effective: BTreeSet::new(),
        };
        let dir = match placement {
            Placement::Storage(storage_id) => Directory::new_root(node, storage_id, access),
            Placement::Directory(parent_id) => Directory::new_child(node, tree.directory(parent_id)?, access),
        };
        let id = dir.id;
        tree.insert_directory(dir)?;
        let changes = self
            .deps
            .engine
            .settle_inserted(&mut tree, &[NodeRef::Directory(id)])?;
        let created = tree.directory(id)?.clone();
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            directory_id = %id,
            path = %created.path(),
            "Directory created"
        );
        self.deps.notifier.publish_created(
            &[created.node_ref()],
            changes,
            Some(ctx.user_id),
            Some(op.id()),
        );
        Ok(created)
    }

    /// Renames a directory and re-derives the paths below it.
    pub async fn rename_directory(
        &self,
        ctx: &RequestContext,
        id: DirectoryId,
        new_name: &str,
    ) -> Result<Directory, AppError> {
        validate_name(new_name)?;
        let node = NodeRef::Directory(id);

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        self.deps.require(ctx, &tree, node, Permission::Write)?;
        if tree.directory(id)?.name() == new_name {
            return Ok(tree.directory(id)?.clone());
        }
        let placement = tree.placement_of(node)?;
        tree.ensure_name_free(placement, new_name, Some(node))?;
        self.deps
            .locks
            .lock_tree(&tree, node, op.holder(), op.id())?;

        let dir = tree.directory_mut(id)?;
        let updated_at = dir.node.updated_at;
        let old_name = std::mem::replace(&mut dir.node.name, new_name.to_string());
        dir.node.touch();
        let wanted = FieldSet::from([DerivedField::Path]);
        let changes = match self.deps.engine.trigger_computation(&mut tree, node, &wanted) {
            Ok(changes) => changes,
            Err(e) => {
                let dir = tree.directory_mut(id)?;
                dir.node.name = old_name;
                dir.node.updated_at = updated_at;
                self.deps.engine.restore(&mut tree, node, &wanted);
                return Err(e);
            }
        };
        let renamed = tree.directory(id)?.clone();
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            directory_id = %id,
            old_name = %old_name,
            new_name = %new_name,
            "Directory renamed"
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

    /// Moves a directory under a new parent.
    pub async fn move_directory(
        &self,
        ctx: &RequestContext,
        id: DirectoryId,
        new_parent_id: DirectoryId,
    ) -> Result<Directory, AppError> {
        let node = NodeRef::Directory(id);
        let target = NodeRef::Directory(new_parent_id);

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        self.deps.require(ctx, &tree, node, Permission::Write)?;
        self.deps.require(ctx, &tree, target, Permission::Create)?;

        let dir = tree.directory(id)?;
        if dir.is_root {
            return Err(AppError::validation("Root directories cannot be moved").for_node(node));
        }
        if tree.is_same_or_ancestor(id, new_parent_id)? {
            return Err(AppError::validation(
                "A directory cannot be moved into itself or one of its descendants",
            )
            .for_node(node));
        }
        let old_parent = dir.parent_id;
        if old_parent == Some(new_parent_id) {
            return Ok(dir.clone());
        }
        let name = dir.name().to_string();
        tree.ensure_name_free(Placement::Directory(new_parent_id), &name, None)?;

        self.deps
            .locks
            .lock_tree(&tree, node, op.holder(), op.id())?;
        self.deps.ensure_unlocked(&op, target)?;

        tree.detach(node)?;
        tree.attach_directory(id, new_parent_id)?;
        tree.directory_mut(id)?.node.touch();

        let mut changes = self.deps.engine.trigger_computation(
            &mut tree,
            node,
            &FieldSet::from(DerivedField::PLACEMENT),
        )?;
        if let Some(old_parent) = old_parent {
            changes.merge(self.deps.engine.refresh_totals(&mut tree, old_parent)?);
        }
        changes.merge(self.deps.engine.refresh_totals(&mut tree, new_parent_id)?);
        let moved = tree.directory(id)?.clone();
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            directory_id = %id,
            new_parent_id = %new_parent_id,
            path = %moved.path(),
            "Directory moved"
        );
        self.deps.notifier.publish(
            node,
            ChangeKind::Moved,
            &["parent"],
            changes,
            Some(ctx.user_id),
            Some(op.id()),
        );
        Ok(moved)
    }

    /// Deep-copies a directory. The copy gets a unique name at the target,
    /// fresh content references, and no locks.
    pub async fn copy_directory(
        &self,
        ctx: &RequestContext,
        id: DirectoryId,
        target: CopyTarget,
    ) -> Result<Directory, AppError> {
        let (placement, save_type, mut plan) = {
            let tree = self.deps.repo.read().await;
            self.deps
                .require(ctx, &tree, NodeRef::Directory(id), Permission::Read)?;
            let placement = self.copy_placement(ctx, &tree, target)?;
            let save_type = match placement {
                Placement::Storage(storage_id) => tree.storage(storage_id)?.save_type,
                Placement::Directory(dir) => tree.storage_of(NodeRef::Directory(dir))?.save_type,
            };
            (placement, save_type, PlannedDirectory::snapshot(&tree, id)?)
        };

        let written = duplicate_plan_content(&self.deps, save_type, plan.files_mut()).await?;

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        let inserted = self.insert_copy(ctx, &op, &mut tree, target, placement, &plan);
        let (created, changes) = match inserted {
            Ok(result) => result,
            Err(e) => {
                drop(tree);
                self.deps.discard_content(written).await;
                return Err(e);
            }
        };
        let top = match created.first() {
            Some(NodeRef::Directory(top)) => *top,
            _ => return Err(AppError::internal("Directory copy created no directory")),
        };
        let copy = tree.directory(top)?.clone();
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            source_id = %id,
            directory_id = %top,
            nodes = created.len(),
            "Directory copied"
        );
        self.deps
            .notifier
            .publish_created(&created, changes, Some(ctx.user_id), Some(op.id()));
        Ok(copy)
    }

    fn copy_placement(&self, ctx: &RequestContext, tree: &TreeState, target: CopyTarget) -> Result<Placement, AppError> {
        match target {
            CopyTarget::Directory(dir) => {
                self.deps
                    .require(ctx, tree, NodeRef::Directory(dir), Permission::Create)?;
                Ok(Placement::Directory(dir))
            }
            CopyTarget::Storage(storage_id) => {
                if !ctx.is_superuser {
                    return Err(AppError::access(
                        "Only superusers can create root directories",
                    ));
                }
                tree.storage(storage_id)?;
                Ok(Placement::Storage(storage_id))
            }
        }
    }

    fn insert_copy(
        &self,
        ctx: &RequestContext,
        op: &Operation,
        tree: &mut TreeState,
        target: CopyTarget,
        placement: Placement,
        plan: &PlannedDirectory,
    ) -> Result<(Vec<NodeRef>, ChangeSet), AppError> {
        // the target may have changed while content was duplicated
        self.copy_placement(ctx, tree, target)?;
        if let Placement::Directory(dir) = placement {
            self.deps.ensure_unlocked(op, NodeRef::Directory(dir))?;
        }

        let name = unique_name(&plan.node.name, &tree.sibling_names(placement, None)?, false);
        let created = plan.materialize(tree, placement, name, ctx.user_id)?;
        match self.deps.engine.settle_inserted(tree, &created) {
            Ok(changes) => Ok((created, changes)),
            Err(e) => {
                if let Some(NodeRef::Directory(top)) = created.first() {
                    tree.remove_subtree(*top)?;
                }
                Err(e)
            }
        }
    }

    /// Deletes a directory and its whole subtree. Fails without changing
    /// anything when any node below is locked by another holder.
    pub async fn delete_directory(&self, ctx: &RequestContext, id: DirectoryId) -> Result<(), AppError> {
        let node = NodeRef::Directory(id);

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        self.deps.require(ctx, &tree, node, Permission::Unlink)?;
        self.deps
            .locks
            .lock_tree(&tree, node, op.holder(), op.id())?;

        let parent = tree.directory(id)?.parent_id;
        let removed = tree.remove_subtree(id)?;
        let changes = match parent {
            Some(parent) => self.deps.engine.refresh_totals(&mut tree, parent)?,
            None => ChangeSet::new(),
        };
        drop(tree);

        let removed_nodes = removed.nodes();
        for node in &removed_nodes {
            self.deps.locks.unlock(*node);
        }
        self.deps.discard_content(removed.content).await;

        info!(
            user_id = %ctx.user_id,
            directory_id = %id,
            directories = removed.directories.len(),
            files = removed.files.len(),
            "Directory deleted"
        );
        self.deps
            .notifier
            .publish_deleted(&removed_nodes, Some(ctx.user_id), Some(op.id()));
        self.deps
            .notifier
            .publish_recomputed(changes, Some(ctx.user_id), Some(op.id()));
        Ok(())
    }

    /// Replaces a directory's explicit access groups and inherit flag, then
    /// re-derives effective groups below it.
    pub async fn set_access_groups(
        &self,
        ctx: &RequestContext,
        id: DirectoryId,
        groups: BTreeSet<AccessGroupId>,
        inherit: bool,
    ) -> Result<Directory, AppError> {
        let node = NodeRef::Directory(id);

        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        if ctx.is_superuser {
            tree.ensure_exists(node)?;
        } else {
            self.deps.require(ctx, &tree, node, Permission::Write)?;
        }
        self.deps.access.registry().ensure_all_exist(&groups)?;
        self.deps.ensure_unlocked(&op, node)?;

        let dir = tree.directory_mut(id)?;
        dir.access.explicit = groups;
        dir.access.inherit = inherit;
        dir.node.touch();
        let changes = self.deps.engine.trigger_computation(
            &mut tree,
            node,
            &FieldSet::from([DerivedField::AccessGroups]),
        )?;
        let updated = tree.directory(id)?.clone();
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            directory_id = %id,
            groups = updated.access.explicit.len(),
            inherit,
            "Directory access groups updated"
        );
        self.deps.notifier.publish(
            node,
            ChangeKind::MetadataUpdated,
            &["access_group_ids", "inherit_access_groups"],
            changes,
            Some(ctx.user_id),
            Some(op.id()),
        );
        Ok(updated)
    }
}
