//! Recompute engine.
//!
//! A trigger recomputes the requested derived fields of one node, then
//! pushes only the fields that actually changed:
//! - downward (path, storage, access groups) to every child, recursively;
//! - upward (size, counts) to the parent, recursively.
//!
//! A node visited while pushing down never pushes up, and vice versa, so
//! one trigger touches each node at most once. Revisiting a node means the
//! tree has a cycle and fails the pass.

use std::collections::HashSet;

use tracing::{debug, warn};

use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::types::{DirectoryId, FileId, NodeRef};
use dms_entity::DirectoryCounts;
use dms_storage::mime;

use crate::repository::TreeState;

use super::field::{ChangeSet, DerivedField, FieldSet, fields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Origin,
    Down,
    Up,
}

/// Stateless driver for derived-field propagation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecomputeEngine;

impl RecomputeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Recompute `wanted` on `node` and propagate what changed.
    pub fn trigger_computation(
        &self,
        tree: &mut TreeState,
        node: NodeRef,
        wanted: &FieldSet,
    ) -> AppResult<ChangeSet> {
        let mut pass = Pass {
            tree,
            visited: HashSet::new(),
            changes: ChangeSet::new(),
        };
        pass.visit(node, wanted, Direction::Origin)?;
        debug!(node = %node, changed_nodes = pass.changes.len(), "Recompute finished");
        Ok(pass.changes)
    }

    /// Re-derive `wanted` after the inputs of a failed recompute were put
    /// back, so nodes the failed pass already rewrote match them again.
    /// Derived values on `node` itself must still hold the failed pass's
    /// output for the difference to propagate.
    pub fn restore(&self, tree: &mut TreeState, node: NodeRef, wanted: &FieldSet) {
        if let Err(e) = self.trigger_computation(tree, node, wanted) {
            warn!(node = %node, error = %e, "Re-deriving fields after a reverted change failed");
        }
    }

    /// Recompute every derived field of a node.
    pub fn recompute_all(&self, tree: &mut TreeState, node: NodeRef) -> AppResult<ChangeSet> {
        let wanted = match node {
            NodeRef::Directory(_) => fields(&DerivedField::DIRECTORY),
            NodeRef::File(_) => fields(&DerivedField::FILE),
        };
        self.trigger_computation(tree, node, &wanted)
    }

    /// Compute every derived field of freshly inserted nodes, listed
    /// parents before children, and refresh the totals of the directory
    /// they were inserted into.
    pub fn settle_inserted(&self, tree: &mut TreeState, created: &[NodeRef]) -> AppResult<ChangeSet> {
        let mut changes = ChangeSet::new();
        for node in created {
            changes.merge(self.recompute_all(tree, *node)?);
        }
        if let Some(first) = created.first() {
            if let Some(parent) = tree.parent_of(*first)? {
                changes.merge(self.refresh_totals(tree, parent)?);
            }
        }
        Ok(changes)
    }

    /// Refresh a directory's size and counters after its children changed.
    pub fn refresh_totals(&self, tree: &mut TreeState, directory: DirectoryId) -> AppResult<ChangeSet> {
        self.trigger_computation(
            tree,
            NodeRef::Directory(directory),
            &fields(&[DerivedField::Size, DerivedField::Counts]),
        )
    }
}

struct Pass<'a> {
    tree: &'a mut TreeState,
    visited: HashSet<NodeRef>,
    changes: ChangeSet,
}

impl Pass<'_> {
    fn visit(&mut self, node: NodeRef, wanted: &FieldSet, direction: Direction) -> AppResult<()> {
        if !self.visited.insert(node) {
            return Err(AppError::internal(format!(
                "Recompute reached {node} twice: the tree contains a cycle"
            ))
            .for_node(node));
        }

        let changed = match node {
            NodeRef::Directory(id) => self.compute_directory(id, wanted)?,
            NodeRef::File(id) => self.compute_file(id, wanted)?,
        };
        self.changes.record(node, changed.iter().copied());

        if direction != Direction::Up {
            let down: FieldSet = changed
                .iter()
                .copied()
                .filter(|field| field.propagates_down())
                .collect();
            if let (false, NodeRef::Directory(id)) = (down.is_empty(), node) {
                let dir = self.tree.directory(id)?;
                let children: Vec<NodeRef> = dir
                    .child_directory_ids
                    .iter()
                    .map(|child| NodeRef::Directory(*child))
                    .chain(dir.file_ids.iter().map(|file| NodeRef::File(*file)))
                    .collect();
                for child in children {
                    self.visit(child, &down, Direction::Down)?;
                }
            }
        }

        if direction != Direction::Down && changed.iter().any(|field| field.propagates_up()) {
            if let Some(parent) = self.tree.parent_of(node)? {
                self.visit(
                    NodeRef::Directory(parent),
                    &fields(&[DerivedField::Size, DerivedField::Counts]),
                    Direction::Up,
                )?;
            }
        }
        Ok(())
    }

    fn compute_directory(&mut self, id: DirectoryId, wanted: &FieldSet) -> AppResult<FieldSet> {
        let dir = self.tree.directory(id)?;
        let parent = dir.parent_id.map(|p| self.tree.directory(p)).transpose()?;

        let path = wanted.contains(&DerivedField::Path).then(|| match parent {
            Some(parent) => format!("{}{}/", parent.path(), dir.name()),
            None => format!("/{}/", dir.name()),
        });

        let storage = if wanted.contains(&DerivedField::Storage) {
            match (dir.root_storage_id, parent) {
                (Some(storage), _) => Some(storage),
                (None, Some(parent)) => Some(parent.storage_id),
                (None, None) => {
                    return Err(AppError::internal(format!(
                        "Directory {id} has no storage to derive from"
                    )));
                }
            }
        } else {
            None
        };

        let effective = wanted
            .contains(&DerivedField::AccessGroups)
            .then(|| dir.access.resolve(parent.map(|p| &p.access.effective)));

        let counts = if wanted.contains(&DerivedField::Size) || wanted.contains(&DerivedField::Counts) {
            let mut counts = DirectoryCounts {
                count_directories: dir.child_directory_ids.len() as u64,
                count_files: dir.file_ids.len() as u64,
                count_total_files: dir.file_ids.len() as u64,
                ..DirectoryCounts::default()
            };
            for child in &dir.child_directory_ids {
                let child = self.tree.directory(*child)?;
                counts.count_total_directories += 1 + child.counts.count_total_directories;
                counts.count_total_files += child.counts.count_total_files;
                counts.size += child.counts.size;
            }
            for file in &dir.file_ids {
                counts.size += self.tree.file(*file)?.size;
            }
            Some(counts)
        } else {
            None
        };

        let dir = self.tree.directory_mut(id)?;
        let mut changed = FieldSet::new();
        assign(&mut dir.node.path, path, DerivedField::Path, &mut changed);
        assign(&mut dir.storage_id, storage, DerivedField::Storage, &mut changed);
        assign(&mut dir.access.effective, effective, DerivedField::AccessGroups, &mut changed);
        if let Some(counts) = counts {
            if counts.size != dir.counts.size {
                changed.insert(DerivedField::Size);
            }
            if counts.counters() != dir.counts.counters() {
                changed.insert(DerivedField::Counts);
            }
            dir.counts = counts;
        }
        Ok(changed)
    }

    fn compute_file(&mut self, id: FileId, wanted: &FieldSet) -> AppResult<FieldSet> {
        let file = self.tree.file(id)?;
        let dir = self.tree.directory(file.directory_id)?;
        let content = file.content.as_ref();

        let path = wanted
            .contains(&DerivedField::Path)
            .then(|| format!("{}{}", dir.path(), file.name()));
        let storage = wanted.contains(&DerivedField::Storage).then_some(dir.storage_id);
        let groups = wanted
            .contains(&DerivedField::AccessGroups)
            .then(|| dir.access.effective.clone());
        let extension = wanted
            .contains(&DerivedField::Extension)
            .then(|| mime::extension(file.name()));
        let mimetype = wanted.contains(&DerivedField::Mimetype).then(|| {
            mime::resolve(file.name(), content.map(|c| c.detected_mimetype.as_str()))
        });
        let checksum = wanted
            .contains(&DerivedField::Checksum)
            .then(|| content.map(|c| c.checksum.clone()));
        let size = wanted
            .contains(&DerivedField::Size)
            .then(|| content.map(|c| c.size).unwrap_or(0));

        let file = self.tree.file_mut(id)?;
        let mut changed = FieldSet::new();
        assign(&mut file.node.path, path, DerivedField::Path, &mut changed);
        assign(&mut file.storage_id, storage, DerivedField::Storage, &mut changed);
        assign(&mut file.access_group_ids, groups, DerivedField::AccessGroups, &mut changed);
        assign(&mut file.extension, extension, DerivedField::Extension, &mut changed);
        assign(&mut file.mimetype, mimetype, DerivedField::Mimetype, &mut changed);
        assign(&mut file.checksum, checksum, DerivedField::Checksum, &mut changed);
        assign(&mut file.size, size, DerivedField::Size, &mut changed);
        Ok(changed)
    }
}

/// Store a recomputed value and note the field if it differs.
fn assign<T: PartialEq>(slot: &mut T, value: Option<T>, field: DerivedField, changed: &mut FieldSet) {
    if let Some(value) = value {
        if *slot != value {
            *slot = value;
            changed.insert(field);
        }
    }
}
