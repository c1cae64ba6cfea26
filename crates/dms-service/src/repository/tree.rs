//! The node graph and its structural helpers.
//!
//! `TreeState` keeps parent and child links consistent: every insert links
//! the node into its parent (or into its storage, for roots) and every
//! removal unlinks it. Derived fields are left to the recompute engine.

use std::collections::{BTreeSet, HashMap, HashSet};

use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::types::{
    AccessGroupId, CategoryId, ContentRef, DirectoryId, FileId, NodeRef, StorageId, TagId,
};
use dms_entity::{Category, Directory, File, NodeInfo, Storage, Tag};

/// Where a node sits: directly under a storage (roots) or in a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Root of a storage.
    Storage(StorageId),
    /// Child of a directory.
    Directory(DirectoryId),
}

/// Everything detached by a subtree removal.
#[derive(Debug, Default)]
pub struct RemovedSubtree {
    /// Removed directories, top first.
    pub directories: Vec<DirectoryId>,
    /// Removed files.
    pub files: Vec<FileId>,
    /// Content that is no longer referenced.
    pub content: Vec<ContentRef>,
}

impl RemovedSubtree {
    /// Every removed node.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.directories
            .iter()
            .map(|id| NodeRef::Directory(*id))
            .chain(self.files.iter().map(|id| NodeRef::File(*id)))
            .collect()
    }
}

/// All records of the document tree.
#[derive(Debug, Default)]
pub struct TreeState {
    pub(crate) storages: HashMap<StorageId, Storage>,
    pub(crate) directories: HashMap<DirectoryId, Directory>,
    pub(crate) files: HashMap<FileId, File>,
    pub(crate) tags: HashMap<TagId, Tag>,
    pub(crate) categories: HashMap<CategoryId, Category>,
}

impl TreeState {
    pub fn storage(&self, id: StorageId) -> AppResult<&Storage> {
        self.storages
            .get(&id)
            .ok_or_else(|| AppError::not_found(format!("Storage {id} not found")))
    }

    pub fn storage_mut(&mut self, id: StorageId) -> AppResult<&mut Storage> {
        self.storages
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Storage {id} not found")))
    }

    pub fn directory(&self, id: DirectoryId) -> AppResult<&Directory> {
        self.directories.get(&id).ok_or_else(|| {
            AppError::not_found(format!("Directory {id} not found")).for_node(NodeRef::Directory(id))
        })
    }

    pub fn directory_mut(&mut self, id: DirectoryId) -> AppResult<&mut Directory> {
        self.directories.get_mut(&id).ok_or_else(|| {
            AppError::not_found(format!("Directory {id} not found")).for_node(NodeRef::Directory(id))
        })
    }

    pub fn file(&self, id: FileId) -> AppResult<&File> {
        self.files.get(&id).ok_or_else(|| {
            AppError::not_found(format!("File {id} not found")).for_node(NodeRef::File(id))
        })
    }

    pub fn file_mut(&mut self, id: FileId) -> AppResult<&mut File> {
        self.files.get_mut(&id).ok_or_else(|| {
            AppError::not_found(format!("File {id} not found")).for_node(NodeRef::File(id))
        })
    }

    pub fn tag(&self, id: TagId) -> AppResult<&Tag> {
        self.tags
            .get(&id)
            .ok_or_else(|| AppError::not_found(format!("Tag {id} not found")))
    }

    pub fn category(&self, id: CategoryId) -> AppResult<&Category> {
        self.categories
            .get(&id)
            .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))
    }

    /// Fails with `NotFound` unless the node exists.
    pub fn ensure_exists(&self, node: NodeRef) -> AppResult<()> {
        match node {
            NodeRef::Directory(id) => self.directory(id).map(|_| ()),
            NodeRef::File(id) => self.file(id).map(|_| ()),
        }
    }

    /// The node's name.
    pub fn name_of(&self, node: NodeRef) -> AppResult<&str> {
        Ok(&self.node_info(node)?.name)
    }

    /// Shared attributes of a node.
    pub fn node_info(&self, node: NodeRef) -> AppResult<&NodeInfo> {
        match node {
            NodeRef::Directory(id) => Ok(&self.directory(id)?.node),
            NodeRef::File(id) => Ok(&self.file(id)?.node),
        }
    }

    pub fn node_info_mut(&mut self, node: NodeRef) -> AppResult<&mut NodeInfo> {
        match node {
            NodeRef::Directory(id) => Ok(&mut self.directory_mut(id)?.node),
            NodeRef::File(id) => Ok(&mut self.file_mut(id)?.node),
        }
    }

    /// The directory owning a node, `None` for roots.
    pub fn parent_of(&self, node: NodeRef) -> AppResult<Option<DirectoryId>> {
        match node {
            NodeRef::Directory(id) => Ok(self.directory(id)?.parent_id),
            NodeRef::File(id) => Ok(Some(self.file(id)?.directory_id)),
        }
    }

    /// Where the node is linked.
    pub fn placement_of(&self, node: NodeRef) -> AppResult<Placement> {
        match node {
            NodeRef::Directory(id) => {
                let dir = self.directory(id)?;
                match (dir.parent_id, dir.root_storage_id) {
                    (Some(parent), _) => Ok(Placement::Directory(parent)),
                    (None, Some(storage)) => Ok(Placement::Storage(storage)),
                    (None, None) => Err(AppError::internal(format!(
                        "Directory {id} has neither a parent nor a storage"
                    ))),
                }
            }
            NodeRef::File(id) => Ok(Placement::Directory(self.file(id)?.directory_id)),
        }
    }

    /// The effective storage of a node.
    pub fn storage_of(&self, node: NodeRef) -> AppResult<&Storage> {
        let storage_id = match node {
            NodeRef::Directory(id) => self.directory(id)?.storage_id,
            NodeRef::File(id) => self.file(id)?.storage_id,
        };
        self.storage(storage_id)
    }

    /// The effective access groups of a node.
    pub fn effective_groups(&self, node: NodeRef) -> AppResult<&BTreeSet<AccessGroupId>> {
        match node {
            NodeRef::Directory(id) => Ok(&self.directory(id)?.access.effective),
            NodeRef::File(id) => Ok(&self.file(id)?.access_group_ids),
        }
    }

    /// Names in use at a placement. Directories and files share one
    /// namespace per parent.
    pub fn sibling_names(&self, placement: Placement, exclude: Option<NodeRef>) -> AppResult<HashSet<String>> {
        let mut names = HashSet::new();
        match placement {
            Placement::Storage(storage_id) => {
                for id in &self.storage(storage_id)?.root_directory_ids {
                    if exclude != Some(NodeRef::Directory(*id)) {
                        names.insert(self.directory(*id)?.node.name.clone());
                    }
                }
            }
            Placement::Directory(dir_id) => {
                let dir = self.directory(dir_id)?;
                for id in &dir.child_directory_ids {
                    if exclude != Some(NodeRef::Directory(*id)) {
                        names.insert(self.directory(*id)?.node.name.clone());
                    }
                }
                for id in &dir.file_ids {
                    if exclude != Some(NodeRef::File(*id)) {
                        names.insert(self.file(*id)?.node.name.clone());
                    }
                }
            }
        }
        Ok(names)
    }

    /// Fails with a validation error when `name` is taken at `placement`.
    pub fn ensure_name_free(&self, placement: Placement, name: &str, exclude: Option<NodeRef>) -> AppResult<()> {
        if self.sibling_names(placement, exclude)?.contains(name) {
            return Err(AppError::validation(format!(
                "A node named '{name}' already exists at this location"
            )));
        }
        Ok(())
    }

    /// Parent chain of a directory, nearest first, excluding itself.
    pub fn ancestors(&self, id: DirectoryId) -> AppResult<Vec<DirectoryId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.directory(id)?.parent_id;
        while let Some(parent) = current {
            if !seen.insert(parent) {
                return Err(AppError::internal(format!(
                    "Parent chain of directory {id} contains a cycle"
                )));
            }
            chain.push(parent);
            current = self.directory(parent)?.parent_id;
        }
        Ok(chain)
    }

    /// Whether `ancestor` is `id` itself or one of its ancestors.
    pub fn is_same_or_ancestor(&self, ancestor: DirectoryId, id: DirectoryId) -> AppResult<bool> {
        Ok(ancestor == id || self.ancestors(id)?.contains(&ancestor))
    }

    /// All directories and files in a subtree, in pre-order.
    pub fn subtree(&self, root: DirectoryId) -> AppResult<(Vec<DirectoryId>, Vec<FileId>)> {
        let mut directories = Vec::new();
        let mut files = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return Err(AppError::internal(format!(
                    "Directory {id} is reachable twice below {root}"
                )));
            }
            let dir = self.directory(id)?;
            directories.push(id);
            files.extend(dir.file_ids.iter().copied());
            stack.extend(dir.child_directory_ids.iter().rev().copied());
        }
        Ok((directories, files))
    }

    /// The node plus, for directories, every descendant.
    pub fn subtree_nodes(&self, node: NodeRef) -> AppResult<Vec<NodeRef>> {
        match node {
            NodeRef::File(id) => {
                self.file(id)?;
                Ok(vec![node])
            }
            NodeRef::Directory(id) => {
                let (directories, files) = self.subtree(id)?;
                Ok(directories
                    .into_iter()
                    .map(NodeRef::Directory)
                    .chain(files.into_iter().map(NodeRef::File))
                    .collect())
            }
        }
    }

    /// Every file stored under a storage's root directories.
    pub fn files_in_storage(&self, storage_id: StorageId) -> AppResult<Vec<FileId>> {
        let mut files = Vec::new();
        for root in &self.storage(storage_id)?.root_directory_ids {
            files.extend(self.subtree(*root)?.1);
        }
        Ok(files)
    }

    /// Insert a directory and link it into its parent or storage.
    pub fn insert_directory(&mut self, dir: Directory) -> AppResult<()> {
        dir.validate_shape()?;
        match (dir.parent_id, dir.root_storage_id) {
            (Some(parent), _) => {
                self.directory_mut(parent)?.child_directory_ids.insert(dir.id);
            }
            (None, Some(storage)) => {
                self.storage_mut(storage)?.root_directory_ids.insert(dir.id);
            }
            (None, None) => {
                return Err(AppError::internal(format!("Directory {} is detached", dir.id)));
            }
        }
        self.directories.insert(dir.id, dir);
        Ok(())
    }

    /// Insert a file and link it into its directory.
    pub fn insert_file(&mut self, file: File) -> AppResult<()> {
        self.directory_mut(file.directory_id)?.file_ids.insert(file.id);
        self.files.insert(file.id, file);
        Ok(())
    }

    /// Unlink a node from wherever it sits, leaving the record in place.
    pub fn detach(&mut self, node: NodeRef) -> AppResult<()> {
        match (node, self.placement_of(node)?) {
            (NodeRef::Directory(id), Placement::Storage(storage)) => {
                self.storage_mut(storage)?.root_directory_ids.remove(&id);
            }
            (NodeRef::Directory(id), Placement::Directory(parent)) => {
                self.directory_mut(parent)?.child_directory_ids.remove(&id);
            }
            (NodeRef::File(id), Placement::Directory(parent)) => {
                self.directory_mut(parent)?.file_ids.remove(&id);
            }
            (NodeRef::File(id), Placement::Storage(_)) => {
                return Err(AppError::internal(format!("File {id} is linked to a storage")));
            }
        }
        Ok(())
    }

    /// Re-link a detached directory under a new parent.
    pub fn attach_directory(&mut self, id: DirectoryId, parent: DirectoryId) -> AppResult<()> {
        self.directory_mut(parent)?.child_directory_ids.insert(id);
        self.directory_mut(id)?.parent_id = Some(parent);
        Ok(())
    }

    /// Re-link a detached file into a new directory.
    pub fn attach_file(&mut self, id: FileId, directory: DirectoryId) -> AppResult<()> {
        self.directory_mut(directory)?.file_ids.insert(id);
        self.file_mut(id)?.directory_id = directory;
        Ok(())
    }

    /// Remove a directory and everything below it.
    pub fn remove_subtree(&mut self, root: DirectoryId) -> AppResult<RemovedSubtree> {
        let (directories, files) = self.subtree(root)?;
        self.detach(NodeRef::Directory(root))?;

        let mut removed = RemovedSubtree::default();
        for id in files {
            if let Some(file) = self.files.remove(&id) {
                removed.content.extend(file.content.map(|c| c.content_ref));
                removed.files.push(id);
            }
        }
        for id in directories {
            if self.directories.remove(&id).is_some() {
                removed.directories.push(id);
            }
        }
        Ok(removed)
    }

    /// Remove one file, returning its content reference.
    pub fn remove_file(&mut self, id: FileId) -> AppResult<Option<ContentRef>> {
        self.detach(NodeRef::File(id))?;
        let file = self.files.remove(&id).ok_or_else(|| {
            AppError::not_found(format!("File {id} not found")).for_node(NodeRef::File(id))
        })?;
        Ok(file.content.map(|c| c.content_ref))
    }

    /// Resolve a materialized path such as `/Root/Sub/a.txt` or
    /// `/Root/Sub/` within one storage.
    pub fn find_by_path(&self, storage_id: StorageId, path: &str) -> AppResult<NodeRef> {
        let not_found = || AppError::not_found(format!("No node at path '{path}'"));
        let wants_directory = path.ends_with('/');
        let mut parts = path
            .strip_prefix('/')
            .ok_or_else(not_found)?
            .split('/')
            .filter(|part| !part.is_empty());

        let root_name = parts.next().ok_or_else(not_found)?;
        let mut current = self
            .storage(storage_id)?
            .root_directory_ids
            .iter()
            .copied()
            .find(|id| self.directories.get(id).is_some_and(|d| d.name() == root_name))
            .ok_or_else(not_found)?;

        let mut remaining: Vec<&str> = parts.collect();
        let last = if wants_directory { None } else { remaining.pop() };

        for name in remaining {
            let dir = self.directory(current)?;
            current = dir
                .child_directory_ids
                .iter()
                .copied()
                .find(|id| self.directories.get(id).is_some_and(|d| d.name() == name))
                .ok_or_else(not_found)?;
        }

        match last {
            None => Ok(NodeRef::Directory(current)),
            Some(name) => {
                let dir = self.directory(current)?;
                if let Some(file) = dir
                    .file_ids
                    .iter()
                    .find(|id| self.files.get(id).is_some_and(|f| f.name() == name))
                {
                    return Ok(NodeRef::File(*file));
                }
                dir.child_directory_ids
                    .iter()
                    .copied()
                    .find(|id| self.directories.get(id).is_some_and(|d| d.name() == name))
                    .map(NodeRef::Directory)
                    .ok_or_else(not_found)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_core::types::SaveType;
    use dms_entity::{AccessPolicy, CreateStorage};

    fn sample() -> (TreeState, StorageId, DirectoryId, DirectoryId, FileId) {
        let mut tree = TreeState::default();
        let storage = Storage::new(CreateStorage {
            name: "Main".into(),
            save_type: Some(SaveType::Database),
            is_hidden: false,
            company_scope: None,
        });
        let storage_id = storage.id;
        tree.storages.insert(storage_id, storage);

        let mut root = Directory::new_root(NodeInfo::new("Root", None), storage_id, AccessPolicy::default());
        root.node.path = "/Root/".into();
        let root_id = root.id;
        tree.insert_directory(root).unwrap();

        let mut sub = Directory::new_child(NodeInfo::new("Sub", None), tree.directory(root_id).unwrap(), AccessPolicy::default());
        sub.node.path = "/Root/Sub/".into();
        let sub_id = sub.id;
        tree.insert_directory(sub).unwrap();

        let file = File::new(NodeInfo::new("a.txt", None), sub_id, storage_id);
        let file_id = file.id;
        tree.insert_file(file).unwrap();

        (tree, storage_id, root_id, sub_id, file_id)
    }

    #[test]
    fn test_links_and_subtree() {
        let (tree, storage_id, root_id, sub_id, file_id) = sample();
        assert!(tree.storage(storage_id).unwrap().root_directory_ids.contains(&root_id));
        assert_eq!(tree.ancestors(sub_id).unwrap(), vec![root_id]);
        assert!(tree.is_same_or_ancestor(root_id, sub_id).unwrap());
        assert!(!tree.is_same_or_ancestor(sub_id, root_id).unwrap());

        let nodes = tree.subtree_nodes(NodeRef::Directory(root_id)).unwrap();
        assert_eq!(
            nodes,
            vec![NodeRef::Directory(root_id), NodeRef::Directory(sub_id), NodeRef::File(file_id)]
        );
        assert_eq!(tree.files_in_storage(storage_id).unwrap(), vec![file_id]);
    }

    #[test]
    fn test_sibling_names_share_namespace() {
        let (tree, _, root_id, sub_id, file_id) = sample();
        let names = tree.sibling_names(Placement::Directory(sub_id), None).unwrap();
        assert!(names.contains("a.txt"));
        let names = tree
            .sibling_names(Placement::Directory(sub_id), Some(NodeRef::File(file_id)))
            .unwrap();
        assert!(names.is_empty());
        assert!(tree
            .ensure_name_free(Placement::Directory(root_id), "Sub", None)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_remove_subtree_unlinks_everything() {
        let (mut tree, storage_id, root_id, sub_id, file_id) = sample();
        let removed = tree.remove_subtree(sub_id).unwrap();
        assert_eq!(removed.directories, vec![sub_id]);
        assert_eq!(removed.files, vec![file_id]);
        assert!(tree.directory(root_id).unwrap().child_directory_ids.is_empty());
        assert!(tree.file(file_id).unwrap_err().is_not_found());

        tree.remove_subtree(root_id).unwrap();
        assert!(tree.storage(storage_id).unwrap().root_directory_ids.is_empty());
    }

    #[test]
    fn test_find_by_path() {
        let (tree, storage_id, root_id, sub_id, file_id) = sample();
        assert_eq!(tree.find_by_path(storage_id, "/Root/").unwrap(), NodeRef::Directory(root_id));
        assert_eq!(tree.find_by_path(storage_id, "/Root/Sub/").unwrap(), NodeRef::Directory(sub_id));
        assert_eq!(tree.find_by_path(storage_id, "/Root/Sub/a.txt").unwrap(), NodeRef::File(file_id));
        assert_eq!(tree.find_by_path(storage_id, "/Root/Sub").unwrap(), NodeRef::Directory(sub_id));
        assert!(tree.find_by_path(storage_id, "/Root/Nope/").unwrap_err().is_not_found());
        assert!(tree.find_by_path(storage_id, "Root").unwrap_err().is_not_found());
    }
}
