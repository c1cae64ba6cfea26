//! Derived field names and per-node change sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use dms_core::types::NodeRef;

/// A field whose value is computed from other nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedField {
    /// Materialized path.
    Path,
    /// Effective storage.
    Storage,
    /// Effective access groups.
    AccessGroups,
    /// File extension.
    Extension,
    /// File mimetype.
    Mimetype,
    /// File checksum.
    Checksum,
    /// File size, or directory subtree size.
    Size,
    /// Directory child and descendant counters.
    Counts,
}

/// A set of derived fields.
pub type FieldSet = BTreeSet<DerivedField>;

impl DerivedField {
    /// Every derived field of a directory.
    pub const DIRECTORY: [DerivedField; 5] = [
        Self::Path,
        Self::Storage,
        Self::AccessGroups,
        Self::Size,
        Self::Counts,
    ];

    /// Every derived field of a file.
    pub const FILE: [DerivedField; 7] = [
        Self::Path,
        Self::Storage,
        Self::AccessGroups,
        Self::Extension,
        Self::Mimetype,
        Self::Checksum,
        Self::Size,
    ];

    /// Fields that depend on the file's content.
    pub const CONTENT: [DerivedField; 3] = [Self::Mimetype, Self::Checksum, Self::Size];

    /// Fields that change when a node moves to another parent.
    pub const PLACEMENT: [DerivedField; 3] = [Self::Path, Self::Storage, Self::AccessGroups];

    /// Fields the children of a changed directory depend on.
    pub fn propagates_down(self) -> bool {
        matches!(self, Self::Path | Self::Storage | Self::AccessGroups)
    }

    /// Fields the parent of a changed node depends on.
    pub fn propagates_up(self) -> bool {
        matches!(self, Self::Size | Self::Counts)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Storage => "storage",
            Self::AccessGroups => "access_groups",
            Self::Extension => "extension",
            Self::Mimetype => "mimetype",
            Self::Checksum => "checksum",
            Self::Size => "size",
            Self::Counts => "counts",
        }
    }
}

impl fmt::Display for DerivedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a field set from a list.
pub fn fields(list: &[DerivedField]) -> FieldSet {
    list.iter().copied().collect()
}

/// Derived fields that actually changed, per node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: BTreeMap<NodeRef, FieldSet>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record changed fields for a node.
    pub fn record(&mut self, node: NodeRef, changed: impl IntoIterator<Item = DerivedField>) {
        let mut changed = changed.into_iter().peekable();
        if changed.peek().is_some() {
            self.changes.entry(node).or_default().extend(changed);
        }
    }

    /// Fold another change set into this one.
    pub fn merge(&mut self, other: ChangeSet) {
        for (node, changed) in other.changes {
            self.record(node, changed);
        }
    }

    /// Changed fields of one node.
    pub fn fields_of(&self, node: NodeRef) -> Option<&FieldSet> {
        self.changes.get(&node)
    }

    /// Forget a node, for nodes that were removed.
    pub fn remove(&mut self, node: NodeRef) -> Option<FieldSet> {
        self.changes.remove(&node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeRef, &FieldSet)> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl IntoIterator for ChangeSet {
    type Item = (NodeRef, FieldSet);
    type IntoIter = std::collections::btree_map::IntoIter<NodeRef, FieldSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
