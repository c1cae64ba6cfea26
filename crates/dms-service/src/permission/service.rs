//! Permission evaluation for nodes and access group administration.

use std::collections::BTreeSet;

use tracing::info;

use dms_core::error::AppError;
use dms_core::events::{ChangeEvent, ChangeKind};
use dms_core::types::{AccessGroupId, NodeRef, RoleId, UserId};
use dms_entity::{AccessGroup, CreateAccessGroup, Permission, PermissionSet};

use crate::context::RequestContext;
use crate::deps::ServiceDeps;
use crate::recompute::{ChangeSet, DerivedField, FieldSet};

/// Answers permission questions and administers access groups.
#[derive(Debug, Clone)]
pub struct PermissionService {
    deps: ServiceDeps,
}

impl PermissionService {
    /// Creates a new permission service.
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    /// Whether the actor may perform `permission` on the node.
    pub async fn check_access(&self, ctx: &RequestContext, node: NodeRef, permission: Permission) -> Result<bool, AppError> {
        let tree = self.deps.repo.read().await;
        tree.ensure_exists(node)?;
        self.deps.allows(ctx, &tree, node, permission)
    }

    /// Like [`check_access`](Self::check_access), failing with an access
    /// error naming the denied permission.
    pub async fn require_access(&self, ctx: &RequestContext, node: NodeRef, permission: Permission) -> Result<(), AppError> {
        let tree = self.deps.repo.read().await;
        self.deps.require(ctx, &tree, node, permission)
    }

    /// The four permission flags of one node.
    pub async fn permissions(&self, ctx: &RequestContext, node: NodeRef) -> Result<PermissionSet, AppError> {
        let tree = self.deps.repo.read().await;
        tree.ensure_exists(node)?;
        if !self.deps.is_visible(ctx, &tree, node)? {
            return Ok(PermissionSet::default());
        }
        Ok(self
            .deps
            .access
            .permission_set(&ctx.principal(), tree.effective_groups(node)?))
    }

    /// Permission flags for many nodes, evaluating the actor's groups once.
    /// Unknown nodes are left out.
    pub async fn permissions_batch(
        &self,
        ctx: &RequestContext,
        nodes: &[NodeRef],
    ) -> Result<Vec<(NodeRef, PermissionSet)>, AppError> {
        let tree = self.deps.repo.read().await;
        let grants = self.deps.access.grants_for(&ctx.principal());
        let mut result = Vec::with_capacity(nodes.len());
        for node in nodes {
            let Ok(groups) = tree.effective_groups(*node) else {
                continue;
            };
            let set = if self.deps.is_visible(ctx, &tree, *node)? {
                grants.permission_set(groups)
            } else {
                PermissionSet::default()
            };
            result.push((*node, set));
        }
        Ok(result)
    }

    /// The subset of `nodes` on which the actor holds `permission`.
    pub async fn filter_allowed(
        &self,
        ctx: &RequestContext,
        nodes: &[NodeRef],
        permission: Permission,
    ) -> Result<Vec<NodeRef>, AppError> {
        Ok(self
            .permissions_batch(ctx, nodes)
            .await?
            .into_iter()
            .filter(|(_, set)| set.allows(permission))
            .map(|(node, _)| node)
            .collect())
    }

    /// Creates an access group.
    pub async fn create_group(&self, ctx: &RequestContext, req: CreateAccessGroup) -> Result<AccessGroup, AppError> {
        require_superuser(ctx)?;
        self.deps.access.registry().create(req)
    }

    /// Gets an access group.
    pub async fn get_group(&self, ctx: &RequestContext, id: AccessGroupId) -> Result<AccessGroup, AppError> {
        require_superuser(ctx)?;
        self.deps.access.registry().get(id)
    }

    /// Lists all access groups.
    pub async fn list_groups(&self, ctx: &RequestContext) -> Result<Vec<AccessGroup>, AppError> {
        require_superuser(ctx)?;
        let mut groups = self.deps.access.registry().list();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    /// Replaces a group's permission flags.
    pub async fn update_permissions(
        &self,
        ctx: &RequestContext,
        id: AccessGroupId,
        permissions: PermissionSet,
    ) -> Result<AccessGroup, AppError> {
        require_superuser(ctx)?;
        let group = self.deps.access.registry().update_permissions(id, permissions)?;
        info!(user_id = %ctx.user_id, group_id = %id, "Access group permissions updated");
        Ok(group)
    }

    pub async fn add_users(
        &self,
        ctx: &RequestContext,
        id: AccessGroupId,
        users: impl IntoIterator<Item = UserId>,
    ) -> Result<AccessGroup, AppError> {
        require_superuser(ctx)?;
        self.deps.access.registry().add_users(id, users)
    }

    pub async fn remove_users(&self, ctx: &RequestContext, id: AccessGroupId, users: &[UserId]) -> Result<AccessGroup, AppError> {
        require_superuser(ctx)?;
        self.deps.access.registry().remove_users(id, users)
    }

    pub async fn add_role(&self, ctx: &RequestContext, id: AccessGroupId, role: RoleId) -> Result<AccessGroup, AppError> {
        require_superuser(ctx)?;
        self.deps.access.registry().add_role(id, role)
    }

    pub async fn remove_role(&self, ctx: &RequestContext, id: AccessGroupId, role: RoleId) -> Result<AccessGroup, AppError> {
        require_superuser(ctx)?;
        self.deps.access.registry().remove_role(id, role)
    }

    /// Sets or clears a group's parent.
    pub async fn set_parent(
        &self,
        ctx: &RequestContext,
        id: AccessGroupId,
        parent: Option<AccessGroupId>,
    ) -> Result<AccessGroup, AppError> {
        require_superuser(ctx)?;
        self.deps.access.registry().set_parent(id, parent)
    }

    /// Effective user set of a group.
    pub async fn effective_users(&self, ctx: &RequestContext, id: AccessGroupId) -> Result<BTreeSet<UserId>, AppError> {
        require_superuser(ctx)?;
        self.deps.access.registry().effective_users(id)
    }

    /// Replaces the members of a host role. Called by the host whenever its
    /// role membership changes.
    pub fn set_role_members(&self, role: RoleId, users: impl IntoIterator<Item = UserId>) {
        self.deps.access.registry().set_role_members(role, users);
    }

    /// Deletes a group, detaches it from every directory, and re-derives
    /// effective groups.
    pub async fn delete_group(&self, ctx: &RequestContext, id: AccessGroupId) -> Result<(), AppError> {
        require_superuser(ctx)?;
        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        self.deps.access.registry().delete(id)?;

        let mut detached = Vec::new();
        for dir in tree.directories.values_mut() {
            if dir.access.explicit.remove(&id) {
                dir.node.touch();
                detached.push(dir.id);
            }
        }
        let mut changes = ChangeSet::new();
        for dir in &detached {
            changes.merge(self.deps.engine.trigger_computation(
                &mut tree,
                NodeRef::Directory(*dir),
                &FieldSet::from([DerivedField::AccessGroups]),
            )?);
        }
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            group_id = %id,
            directories = detached.len(),
            "Access group deleted"
        );
        for dir in &detached {
            let node = NodeRef::Directory(*dir);
            changes.remove(node);
            self.deps.notifier.notify(ChangeEvent::new(
                node,
                ChangeKind::MetadataUpdated,
                ["access_group_ids", "access_groups"],
                Some(ctx.user_id),
                Some(op.id()),
            ));
        }
        self.deps
            .notifier
            .publish_recomputed(changes, Some(ctx.user_id), Some(op.id()));
        Ok(())
    }
}

fn require_superuser(ctx: &RequestContext) -> Result<(), AppError> {
    if ctx.is_superuser {
        Ok(())
    } else {
        Err(AppError::access("Only superusers can administer access groups"))
    }
}
