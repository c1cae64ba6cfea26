//! Permission flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An operation class that access groups grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// View a node and read its content.
    Read,
    /// Create children under a directory.
    Create,
    /// Modify a node (rename, move, content, metadata).
    Write,
    /// Delete a node.
    Unlink,
}

impl Permission {
    /// All permissions in evaluation order.
    pub const ALL: [Permission; 4] = [Self::Read, Self::Create, Self::Write, Self::Unlink];

    /// Return the permission as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Write => "write",
            Self::Unlink => "unlink",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Permission {
    type Err = dms_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "create" => Ok(Self::Create),
            "write" => Ok(Self::Write),
            "unlink" => Ok(Self::Unlink),
            _ => Err(dms_core::AppError::validation(format!(
                "Invalid permission: '{s}'"
            ))),
        }
    }
}

/// The four permission booleans, either granted by a group or computed
/// for an actor on a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionSet {
    /// Read permission.
    pub read: bool,
    /// Create permission.
    pub create: bool,
    /// Write permission.
    pub write: bool,
    /// Unlink permission.
    pub unlink: bool,
}

impl PermissionSet {
    /// Every permission granted.
    pub fn all() -> Self {
        Self {
            read: true,
            create: true,
            write: true,
            unlink: true,
        }
    }

    /// Read-only.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Whether the given permission is granted.
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::Read => self.read,
            Permission::Create => self.create,
            Permission::Write => self.write,
            Permission::Unlink => self.unlink,
        }
    }

    /// Set a single permission.
    pub fn set(&mut self, permission: Permission, granted: bool) {
        match permission {
            Permission::Read => self.read = granted,
            Permission::Create => self.create = granted,
            Permission::Write => self.write = granted,
            Permission::Unlink => self.unlink = granted,
        }
    }
}
