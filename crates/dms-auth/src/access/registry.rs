//! Access group registry and effective-user resolution.
//!
//! Membership rules:
//! - A group's effective users are its explicit users, the members of its
//!   role groups, and the effective users of its parent group.
//! - Parent chains must be acyclic; `set_parent` rejects a cycle.

use std::collections::{BTreeSet, HashSet};

use dashmap::DashMap;
use tracing::{debug, info};

use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::types::{AccessGroupId, RoleId, UserId};
use dms_entity::access::{AccessGroup, CreateAccessGroup, PermissionSet};

/// Holds all access groups and the host-provided role membership.
#[derive(Debug, Default)]
pub struct AccessGroupRegistry {
    /// Group ID → group.
    groups: DashMap<AccessGroupId, AccessGroup>,
    /// Role ID → member users, pushed by the host.
    role_members: DashMap<RoleId, BTreeSet<UserId>>,
}

impl AccessGroupRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group.
    pub fn create(&self, req: CreateAccessGroup) -> AppResult<AccessGroup> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("Access group name cannot be empty"));
        }
        if let Some(parent_id) = req.parent_group_id {
            self.ensure_exists(parent_id)?;
        }

        let group = AccessGroup::new(req);
        self.groups.insert(group.id, group.clone());
        info!(group_id = %group.id, name = %group.name, "Access group created");
        Ok(group)
    }

    /// Gets a group by ID.
    pub fn get(&self, id: AccessGroupId) -> AppResult<AccessGroup> {
        self.groups
            .get(&id)
            .map(|g| g.value().clone())
            .ok_or_else(|| AppError::not_found(format!("Access group {id} not found")))
    }

    /// Whether a group exists.
    pub fn contains(&self, id: AccessGroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Lists all groups.
    pub fn list(&self) -> Vec<AccessGroup> {
        self.groups.iter().map(|g| g.value().clone()).collect()
    }

    /// Fails with `NotFound` unless every listed group exists.
    pub fn ensure_all_exist<'a>(&self, ids: impl IntoIterator<Item = &'a AccessGroupId>) -> AppResult<()> {
        for id in ids {
            self.ensure_exists(*id)?;
        }
        Ok(())
    }

    /// Replaces a group's permission flags.
    pub fn update_permissions(&self, id: AccessGroupId, permissions: PermissionSet) -> AppResult<AccessGroup> {
        self.modify(id, |group| group.permissions = permissions)
    }

    /// Adds users to a group's explicit user set.
    pub fn add_users(&self, id: AccessGroupId, users: impl IntoIterator<Item = UserId>) -> AppResult<AccessGroup> {
        let users: Vec<UserId> = users.into_iter().collect();
        self.modify(id, |group| group.explicit_users.extend(users))
    }

    /// Removes users from a group's explicit user set.
    pub fn remove_users(&self, id: AccessGroupId, users: &[UserId]) -> AppResult<AccessGroup> {
        self.modify(id, |group| {
            for user in users {
                group.explicit_users.remove(user);
            }
        })
    }

    /// Adds a host role whose members join the group.
    pub fn add_role(&self, id: AccessGroupId, role: RoleId) -> AppResult<AccessGroup> {
        self.modify(id, |group| {
            group.role_groups.insert(role);
        })
    }

    /// Removes a host role from the group.
    pub fn remove_role(&self, id: AccessGroupId, role: RoleId) -> AppResult<AccessGroup> {
        self.modify(id, |group| {
            group.role_groups.remove(&role);
        })
    }

    /// Sets or clears a group's parent, rejecting cycles.
    pub fn set_parent(&self, id: AccessGroupId, parent: Option<AccessGroupId>) -> AppResult<AccessGroup> {
        self.ensure_exists(id)?;
        if let Some(parent_id) = parent {
            self.ensure_exists(parent_id)?;
            if self.ancestry(parent_id)?.contains(&id) {
                return Err(AppError::validation(format!(
                    "Access group {parent_id} cannot become the parent of {id}: it would create a cycle"
                )));
            }
        }
        self.modify(id, |group| group.parent_group_id = parent)
    }

    /// Deletes a group. Groups that named it as parent lose their parent.
    pub fn delete(&self, id: AccessGroupId) -> AppResult<AccessGroup> {
        let (_, removed) = self
            .groups
            .remove(&id)
            .ok_or_else(|| AppError::not_found(format!("Access group {id} not found")))?;

        for mut group in self.groups.iter_mut() {
            if group.parent_group_id == Some(id) {
                group.parent_group_id = None;
            }
        }

        info!(group_id = %id, "Access group deleted");
        Ok(removed)
    }

    /// Replaces the member list of a host role.
    pub fn set_role_members(&self, role: RoleId, users: impl IntoIterator<Item = UserId>) {
        let users: BTreeSet<UserId> = users.into_iter().collect();
        debug!(role_id = %role, members = users.len(), "Role membership updated");
        self.role_members.insert(role, users);
    }

    /// Computes the effective user set of a group.
    pub fn effective_users(&self, id: AccessGroupId) -> AppResult<BTreeSet<UserId>> {
        let mut users = BTreeSet::new();
        for group_id in self.ancestry(id)? {
            let group = self.get(group_id)?;
            users.extend(group.explicit_users.iter().copied());
            for role in &group.role_groups {
                if let Some(members) = self.role_members.get(role) {
                    users.extend(members.iter().copied());
                }
            }
        }
        Ok(users)
    }

    /// Whether a user is in a group's effective user set.
    ///
    /// Unknown groups have no members.
    pub fn is_member(&self, id: AccessGroupId, user: UserId) -> bool {
        let Ok(chain) = self.ancestry(id) else {
            return false;
        };
        chain.into_iter().any(|group_id| {
            self.groups
                .get(&group_id)
                .map(|group| {
                    group.explicit_users.contains(&user)
                        || group.role_groups.iter().any(|role| {
                            self.role_members
                                .get(role)
                                .map(|members| members.contains(&user))
                                .unwrap_or(false)
                        })
                })
                .unwrap_or(false)
        })
    }

    /// Snapshot of every group's ID and permission flags.
    pub fn permission_table(&self) -> Vec<(AccessGroupId, PermissionSet)> {
        self.groups
            .iter()
            .map(|g| (g.id, g.permissions))
            .collect()
    }

    /// The group itself followed by its parent chain.
    fn ancestry(&self, id: AccessGroupId) -> AppResult<Vec<AccessGroupId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(group_id) = current {
            if !seen.insert(group_id) {
                return Err(AppError::internal(format!(
                    "Access group parent chain of {id} contains a cycle"
                )));
            }
            chain.push(group_id);
            current = self
                .groups
                .get(&group_id)
                .and_then(|g| g.parent_group_id);
        }
        Ok(chain)
    }

    fn ensure_exists(&self, id: AccessGroupId) -> AppResult<()> {
        if self.groups.contains_key(&id) {
            Ok(())
        } else {
            Err(AppError::not_found(format!("Access group {id} not found")))
        }
    }

    fn modify(&self, id: AccessGroupId, f: impl FnOnce(&mut AccessGroup)) -> AppResult<AccessGroup> {
        let mut group = self
            .groups
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Access group {id} not found")))?;
        f(&mut group);
        Ok(group.clone())
    }
}
