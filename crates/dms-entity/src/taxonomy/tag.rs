//! Tag model.

use serde::{Deserialize, Serialize};

use dms_core::types::{CategoryId, TagId};

/// A label that can be attached to any node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Unique tag identifier.
    pub id: TagId,
    /// Tag name.
    pub name: String,
    /// Optional display color index.
    pub color: Option<u32>,
    /// Category the tag is grouped under.
    pub category_id: Option<CategoryId>,
}
