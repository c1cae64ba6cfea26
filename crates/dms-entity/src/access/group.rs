//! Access group model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dms_core::types::{AccessGroupId, RoleId, UserId};

use super::permission::PermissionSet;

/// A named set of users and roles carrying permission flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGroup {
    /// Unique group identifier.
    pub id: AccessGroupId,
    /// Group name.
    pub name: String,
    /// Granted permission flags.
    pub permissions: PermissionSet,
    /// Group whose users this group inherits.
    pub parent_group_id: Option<AccessGroupId>,
    /// Users listed directly on the group.
    pub explicit_users: BTreeSet<UserId>,
    /// Host role groups whose members are implicitly included.
    pub role_groups: BTreeSet<RoleId>,
    /// When the group was created.
    pub created_at: DateTime<Utc>,
}

impl AccessGroup {
    /// Build a group from a creation request.
    pub fn new(req: CreateAccessGroup) -> Self {
        Self {
            id: AccessGroupId::new(),
            name: req.name,
            permissions: req.permissions,
            parent_group_id: req.parent_group_id,
            explicit_users: req.explicit_users,
            role_groups: req.role_groups,
            created_at: Utc::now(),
        }
    }
}

/// Data required to create an access group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAccessGroup {
    /// Group name.
    pub name: String,
    /// Granted permission flags.
    pub permissions: PermissionSet,
    /// Optional parent group.
    pub parent_group_id: Option<AccessGroupId>,
    /// Users listed directly on the group.
    pub explicit_users: BTreeSet<UserId>,
    /// Host role groups.
    pub role_groups: BTreeSet<RoleId>,
}
