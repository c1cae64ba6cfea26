//! Detached snapshots of subtrees, used to copy them.
//!
//! A copy is planned under the read guard, its content is duplicated with
//! no guard held, and the snapshot is then materialized under the write
//! guard.

use std::collections::HashSet;

use chrono::Utc;

use dms_core::error::AppError;
use dms_core::types::{ContentRef, DirectoryId, FileId, NodeRef, SaveType, UserId};
use dms_entity::{AccessPolicy, ContentInfo, Directory, File, NodeInfo};

use crate::deps::ServiceDeps;
use crate::repository::{Placement, TreeState};

/// A file to be created by a copy.
#[derive(Debug, Clone)]
pub(crate) struct PlannedFile {
    pub node: NodeInfo,
    pub content: Option<ContentInfo>,
}

impl PlannedFile {
    pub fn snapshot(tree: &TreeState, id: FileId) -> Result<Self, AppError> {
        let file = tree.file(id)?;
        Ok(Self {
            node: file.node.clone(),
            content: file.content.clone(),
        })
    }

    /// Insert the copy into a directory under `name`.
    pub fn materialize(
        &self,
        tree: &mut TreeState,
        directory: DirectoryId,
        name: String,
        actor: UserId,
    ) -> Result<FileId, AppError> {
        let storage_id = tree.directory(directory)?.storage_id;
        let mut file = File::new(fresh_node(&self.node, name, actor), directory, storage_id);
        file.content = self.content.clone();
        let id = file.id;
        tree.insert_file(file)?;
        Ok(id)
    }
}

/// A directory, with everything below it, to be created by a copy.
#[derive(Debug, Clone)]
pub(crate) struct PlannedDirectory {
    pub node: NodeInfo,
    pub access: AccessPolicy,
    pub directories: Vec<PlannedDirectory>,
    pub files: Vec<PlannedFile>,
}

impl PlannedDirectory {
    pub fn snapshot(tree: &TreeState, id: DirectoryId) -> Result<Self, AppError> {
        Self::snapshot_inner(tree, id, &mut HashSet::new())
    }

    fn snapshot_inner(tree: &TreeState, id: DirectoryId, seen: &mut HashSet<DirectoryId>) -> Result<Self, AppError> {
        if !seen.insert(id) {
            return Err(AppError::internal(format!(
                "Directory {id} is reachable twice while planning a copy"
            )));
        }
        let dir = tree.directory(id)?;
        let directories = dir
            .child_directory_ids
            .iter()
            .map(|child| Self::snapshot_inner(tree, *child, seen))
            .collect::<Result<Vec<_>, _>>()?;
        let files = dir
            .file_ids
            .iter()
            .map(|file| PlannedFile::snapshot(tree, *file))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            node: dir.node.clone(),
            access: AccessPolicy {
                effective: Default::default(),
                ..dir.access.clone()
            },
            directories,
            files,
        })
    }

    /// Every planned file in the subtree.
    pub fn files_mut(&mut self) -> Vec<&mut PlannedFile> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(dir) = stack.pop() {
            let PlannedDirectory {
                directories, files, ..
            } = dir;
            out.extend(files);
            stack.extend(directories);
        }
        out
    }

    /// Insert the copy at `placement` under `name`. Returns the created
    /// nodes, parents before children.
    pub fn materialize(
        &self,
        tree: &mut TreeState,
        placement: Placement,
        name: String,
        actor: UserId,
    ) -> Result<Vec<NodeRef>, AppError> {
        let mut created = Vec::new();
        self.materialize_into(tree, placement, name, actor, &mut created)?;
        Ok(created)
    }

    fn materialize_into(
        &self,
        tree: &mut TreeState,
        placement: Placement,
        name: String,
        actor: UserId,
        created: &mut Vec<NodeRef>,
    ) -> Result<(), AppError> {
        let node = fresh_node(&self.node, name, actor);
        let dir = match placement {
            Placement::Storage(storage) => Directory::new_root(node, storage, self.access.clone()),
            Placement::Directory(parent) => {
                Directory::new_child(node, tree.directory(parent)?, self.access.clone())
            }
        };
        let id = dir.id;
        tree.insert_directory(dir)?;
        created.push(NodeRef::Directory(id));

        for child in &self.directories {
            child.materialize_into(
                tree,
                Placement::Directory(id),
                child.node.name.clone(),
                actor,
                created,
            )?;
        }
        for file in &self.files {
            let file_id = file.materialize(tree, id, file.node.name.clone(), actor)?;
            created.push(NodeRef::File(file_id));
        }
        Ok(())
    }
}

/// Node attributes for a copy: same name-independent metadata, new
/// creator and timestamps.
fn fresh_node(source: &NodeInfo, name: String, actor: UserId) -> NodeInfo {
    let now = Utc::now();
    NodeInfo {
        name,
        path: String::new(),
        created_by: Some(actor),
        created_at: now,
        updated_at: now,
        ..source.clone()
    }
}

/// Duplicate content into the target backend. Every reference written is
/// pushed to `written` so the caller can discard them on failure.
pub(crate) async fn duplicate_content(
    deps: &ServiceDeps,
    target: SaveType,
    source: &ContentInfo,
    written: &mut Vec<ContentRef>,
) -> Result<ContentInfo, AppError> {
    let data = deps.content.read(&source.content_ref).await?;
    let content_ref = deps.content.put(target, data).await?;
    written.push(content_ref.clone());
    Ok(ContentInfo {
        content_ref,
        ..source.clone()
    })
}

/// Duplicate the content of every planned file, all or nothing.
pub(crate) async fn duplicate_plan_content(
    deps: &ServiceDeps,
    target: SaveType,
    files: Vec<&mut PlannedFile>,
) -> Result<Vec<ContentRef>, AppError> {
    let mut written = Vec::new();
    for file in files {
        let Some(source) = file.content.as_ref() else {
            continue;
        };
        match duplicate_content(deps, target, source, &mut written).await {
            Ok(copy) => file.content = Some(copy),
            Err(e) => {
                deps.discard_content(written).await;
                return Err(e);
            }
        }
    }
    Ok(written)
}
