//! Attributes shared by every directory and file.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dms_core::types::{CategoryId, TagId, UserId};

/// Identity-independent attributes common to all nodes.
///
/// Directories and files embed this value instead of inheriting from a
/// shared base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Filesystem-safe name, unique among siblings.
    pub name: String,
    /// Derived materialized path, recomputed on move/rename.
    pub path: String,
    /// Optional display color index.
    pub color: Option<u32>,
    /// Attached tags.
    pub tags: BTreeSet<TagId>,
    /// Optional category.
    pub category_id: Option<CategoryId>,
    /// The user who created the node.
    pub created_by: Option<UserId>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// When the node was last updated.
    pub updated_at: DateTime<Utc>,
}

impl NodeInfo {
    /// Create node attributes with an empty path and no metadata.
    pub fn new(name: impl Into<String>, created_by: Option<UserId>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            path: String::new(),
            color: None,
            tags: BTreeSet::new(),
            category_id: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
