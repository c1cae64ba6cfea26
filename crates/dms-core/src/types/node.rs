//! Polymorphic references to directory-or-file nodes.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::{DirectoryId, FileId};

/// The kind of a node in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A directory.
    Directory,
    /// A file.
    File,
}

impl NodeKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed reference to a directory or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum NodeRef {
    /// A directory node.
    Directory(DirectoryId),
    /// A file node.
    File(FileId),
}

impl NodeRef {
    /// The kind of node referenced.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Directory(_) => NodeKind::Directory,
            Self::File(_) => NodeKind::File,
        }
    }

    /// The raw UUID of the referenced node.
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Directory(id) => id.0,
            Self::File(id) => id.0,
        }
    }
}

impl From<DirectoryId> for NodeRef {
    fn from(id: DirectoryId) -> Self {
        Self::Directory(id)
    }
}

impl From<FileId> for NodeRef {
    fn from(id: FileId) -> Self {
        Self::File(id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.uuid())
    }
}
