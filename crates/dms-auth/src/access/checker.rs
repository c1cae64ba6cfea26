//! Permission evaluation against access groups.
//!
//! Resolution order:
//! 1. Superuser bypass: superusers may do anything.
//! 2. Group grant: some group in the node's effective set carries the
//!    permission flag and has the user among its effective users.
//! 3. Denied: including every node with no effective groups at all.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::types::{AccessGroupId, NodeRef, UserId};
use dms_entity::access::{Permission, PermissionSet};

use super::registry::AccessGroupRegistry;

/// The identity permissions are evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// The acting user.
    pub user_id: UserId,
    /// Whether the user bypasses all checks.
    pub is_superuser: bool,
}

impl Principal {
    /// A regular user.
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_superuser: false,
        }
    }

    /// A superuser.
    pub fn superuser(user_id: UserId) -> Self {
        Self {
            user_id,
            is_superuser: true,
        }
    }
}

/// For one principal, the groups granting each permission.
///
/// Building the table costs one pass over the registry; checking a node
/// afterwards is a set intersection. Use it to filter large result sets.
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    superuser: bool,
    read: HashSet<AccessGroupId>,
    create: HashSet<AccessGroupId>,
    write: HashSet<AccessGroupId>,
    unlink: HashSet<AccessGroupId>,
}

impl GrantTable {
    fn granting(&self, permission: Permission) -> &HashSet<AccessGroupId> {
        match permission {
            Permission::Read => &self.read,
            Permission::Create => &self.create,
            Permission::Write => &self.write,
            Permission::Unlink => &self.unlink,
        }
    }

    fn granting_mut(&mut self, permission: Permission) -> &mut HashSet<AccessGroupId> {
        match permission {
            Permission::Read => &mut self.read,
            Permission::Create => &mut self.create,
            Permission::Write => &mut self.write,
            Permission::Unlink => &mut self.unlink,
        }
    }

    /// Whether a node carrying `groups` allows `permission`.
    pub fn allows(&self, groups: &BTreeSet<AccessGroupId>, permission: Permission) -> bool {
        if self.superuser {
            return true;
        }
        let granting = self.granting(permission);
        groups.iter().any(|group| granting.contains(group))
    }

    /// The four permission booleans for a node carrying `groups`.
    pub fn permission_set(&self, groups: &BTreeSet<AccessGroupId>) -> PermissionSet {
        let mut set = PermissionSet::default();
        for permission in Permission::ALL {
            set.set(permission, self.allows(groups, permission));
        }
        set
    }
}

/// Evaluates permissions using the group registry.
#[derive(Debug, Clone)]
pub struct AccessChecker {
    /// Group registry.
    registry: Arc<AccessGroupRegistry>,
}

impl AccessChecker {
    /// Creates a new checker.
    pub fn new(registry: Arc<AccessGroupRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<AccessGroupRegistry> {
        &self.registry
    }

    /// Whether `principal` may perform `permission` on a node carrying the
    /// effective `groups`.
    pub fn check_access(
        &self,
        principal: &Principal,
        groups: &BTreeSet<AccessGroupId>,
        permission: Permission,
    ) -> bool {
        if principal.is_superuser {
            return true;
        }
        groups.iter().any(|group_id| {
            self.registry
                .get(*group_id)
                .map(|group| group.permissions.allows(permission))
                .unwrap_or(false)
                && self.registry.is_member(*group_id, principal.user_id)
        })
    }

    /// Like [`check_access`](Self::check_access) but fails with an access
    /// error naming the denied operation.
    pub fn require_access(
        &self,
        principal: &Principal,
        node: NodeRef,
        groups: &BTreeSet<AccessGroupId>,
        permission: Permission,
    ) -> AppResult<()> {
        if self.check_access(principal, groups, permission) {
            Ok(())
        } else {
            Err(AppError::access_denied(node, permission))
        }
    }

    /// Precomputes, for `principal`, which groups grant each permission.
    pub fn grants_for(&self, principal: &Principal) -> GrantTable {
        let mut table = GrantTable {
            superuser: principal.is_superuser,
            ..GrantTable::default()
        };
        if principal.is_superuser {
            return table;
        }
        for (group_id, permissions) in self.registry.permission_table() {
            if !self.registry.is_member(group_id, principal.user_id) {
                continue;
            }
            for permission in Permission::ALL {
                if permissions.allows(permission) {
                    table.granting_mut(permission).insert(group_id);
                }
            }
        }
        table
    }

    /// The four permission booleans for one node.
    pub fn permission_set(&self, principal: &Principal, groups: &BTreeSet<AccessGroupId>) -> PermissionSet {
        self.grants_for(principal).permission_set(groups)
    }
}
