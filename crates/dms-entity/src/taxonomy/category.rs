//! Category model.

use serde::{Deserialize, Serialize};

use dms_core::types::CategoryId;

/// A hierarchical classification for nodes and tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique category identifier.
    pub id: CategoryId,
    /// Category name.
    pub name: String,
    /// Parent category.
    pub parent_id: Option<CategoryId>,
}
