//! File model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use dms_core::types::{AccessGroupId, ContentRef, DirectoryId, FileId, NodeRef, SaveType, StorageId};

use crate::node::NodeInfo;

/// Facts about the currently stored content, captured at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    /// Where the bytes live.
    pub content_ref: ContentRef,
    /// Byte length.
    pub size: u64,
    /// Hex SHA-1 of the bytes.
    pub checksum: String,
    /// Mimetype sniffed from the bytes, used when the name has no known
    /// extension.
    pub detected_mimetype: String,
}

/// A leaf node owning exactly one content reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    /// Unique file identifier.
    pub id: FileId,
    /// Shared node attributes.
    pub node: NodeInfo,
    /// Owning directory.
    pub directory_id: DirectoryId,
    /// Stored content, created lazily on first write.
    pub content: Option<ContentInfo>,
    /// Effective storage, derived from the directory.
    pub storage_id: StorageId,
    /// Effective access groups, derived from the directory.
    pub access_group_ids: BTreeSet<AccessGroupId>,
    /// Derived content size in bytes.
    pub size: u64,
    /// Derived content checksum.
    pub checksum: Option<String>,
    /// Derived lowercase extension without the dot.
    pub extension: Option<String>,
    /// Derived mimetype.
    pub mimetype: String,
}

impl File {
    /// Create an empty file in a directory. Derived fields are filled in
    /// by the first recompute.
    pub fn new(node: NodeInfo, directory_id: DirectoryId, storage_id: StorageId) -> Self {
        Self {
            id: FileId::new(),
            node,
            directory_id,
            content: None,
            storage_id,
            access_group_ids: BTreeSet::new(),
            size: 0,
            checksum: None,
            extension: None,
            mimetype: String::new(),
        }
    }

    /// This file as a node reference.
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::File(self.id)
    }

    /// The file name.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// The file path.
    pub fn path(&self) -> &str {
        &self.node.path
    }

    /// The backend currently holding this file's content.
    pub fn content_backend(&self) -> Option<SaveType> {
        self.content.as_ref().map(|c| c.content_ref.backend)
    }

    /// Whether the content lives outside the given target backend.
    pub fn requires_migration(&self, target: SaveType) -> bool {
        self.content_backend()
            .map(|backend| backend != target)
            .unwrap_or(false)
    }

    /// Human-readable migration label such as `"database > file"`.
    pub fn migration_label(&self, target: SaveType) -> Option<String> {
        self.content_backend()
            .filter(|backend| *backend != target)
            .map(|backend| format!("{backend} > {target}"))
    }
}
