//! Directory model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::types::{DirectoryId, FileId, NodeRef, StorageId};

use crate::access::AccessPolicy;
use crate::node::NodeInfo;

/// Cached subtree counters, all derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCounts {
    /// Direct child directories.
    pub count_directories: u64,
    /// Direct child files.
    pub count_files: u64,
    /// All descendant directories.
    pub count_total_directories: u64,
    /// All descendant files.
    pub count_total_files: u64,
    /// Sum of all descendant file sizes in bytes.
    pub size: u64,
}

impl DirectoryCounts {
    /// The four node counters, without the size.
    pub fn counters(&self) -> (u64, u64, u64, u64) {
        (
            self.count_directories,
            self.count_files,
            self.count_total_directories,
            self.count_total_files,
        )
    }
}

/// A tree container owning child directories and files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directory {
    /// Unique directory identifier.
    pub id: DirectoryId,
    /// Shared node attributes.
    pub node: NodeInfo,
    /// Whether this directory is a storage root.
    pub is_root: bool,
    /// Parent directory, empty for roots.
    pub parent_id: Option<DirectoryId>,
    /// Bound storage, set only on roots.
    pub root_storage_id: Option<StorageId>,
    /// Effective storage, derived from the root of the subtree.
    pub storage_id: StorageId,
    /// Explicit and effective access groups.
    pub access: AccessPolicy,
    /// Owned child directories.
    pub child_directory_ids: BTreeSet<DirectoryId>,
    /// Owned child files.
    pub file_ids: BTreeSet<FileId>,
    /// Derived counters.
    pub counts: DirectoryCounts,
}

impl Directory {
    /// Create a root directory bound to a storage.
    pub fn new_root(node: NodeInfo, storage_id: StorageId, access: AccessPolicy) -> Self {
        Self {
            id: DirectoryId::new(),
            node,
            is_root: true,
            parent_id: None,
            root_storage_id: Some(storage_id),
            storage_id,
            access,
            child_directory_ids: BTreeSet::new(),
            file_ids: BTreeSet::new(),
            counts: DirectoryCounts::default(),
        }
    }

    /// Create a non-root directory under a parent. The effective storage
    /// is copied from the parent until the next recompute.
    pub fn new_child(node: NodeInfo, parent: &Directory, access: AccessPolicy) -> Self {
        Self {
            id: DirectoryId::new(),
            node,
            is_root: false,
            parent_id: Some(parent.id),
            root_storage_id: None,
            storage_id: parent.storage_id,
            access,
            child_directory_ids: BTreeSet::new(),
            file_ids: BTreeSet::new(),
            counts: DirectoryCounts::default(),
        }
    }

    /// This directory as a node reference.
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::Directory(self.id)
    }

    /// The directory name.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// The directory path.
    pub fn path(&self) -> &str {
        &self.node.path
    }

    /// Check the root/child shape invariant: a root has a storage and no
    /// parent, a child has a parent and no storage of its own.
    pub fn validate_shape(&self) -> AppResult<()> {
        let root_shape = self.is_root && self.root_storage_id.is_some() && self.parent_id.is_none();
        let child_shape = !self.is_root && self.parent_id.is_some() && self.root_storage_id.is_none();
        if root_shape || child_shape {
            Ok(())
        } else {
            Err(AppError::validation(
                "A directory must be either a root bound to a storage or a child of a parent",
            )
            .for_node(self.node_ref()))
        }
    }
}
