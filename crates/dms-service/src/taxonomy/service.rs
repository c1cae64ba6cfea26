//! Tag and category management plus node metadata updates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use dms_core::error::AppError;
use dms_core::events::{ChangeEvent, ChangeKind};
use dms_core::types::{CategoryId, NodeRef, TagId};
use dms_entity::{Category, NodeInfo, Permission, Tag};

use crate::context::RequestContext;
use crate::deps::ServiceDeps;
use crate::repository::TreeState;

/// Partial update of a node's metadata. `None` leaves a field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataUpdate {
    pub color: Option<Option<u32>>,
    pub tags: Option<BTreeSet<TagId>>,
    pub category_id: Option<Option<CategoryId>>,
}

impl MetadataUpdate {
    fn is_empty(&self) -> bool {
        self.color.is_none() && self.tags.is_none() && self.category_id.is_none()
    }
}

/// Manages tags, categories, and the metadata attached to nodes.
#[derive(Debug, Clone)]
pub struct TaxonomyService {
    deps: ServiceDeps,
}

impl TaxonomyService {
    /// Creates a new taxonomy service.
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    /// Creates a category, optionally below another one.
    pub async fn create_category(
        &self,
        ctx: &RequestContext,
        name: &str,
        parent_id: Option<CategoryId>,
    ) -> Result<Category, AppError> {
        require_superuser(ctx)?;
        let name = required_name(name, "Category")?;
        let mut tree = self.deps.repo.write().await;
        if let Some(parent) = parent_id {
            tree.category(parent)?;
        }
        let category = Category {
            id: CategoryId::new(),
            name,
            parent_id,
        };
        tree.categories.insert(category.id, category.clone());
        drop(tree);

        info!(user_id = %ctx.user_id, category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Creates a tag.
    pub async fn create_tag(
        &self,
        ctx: &RequestContext,
        name: &str,
        color: Option<u32>,
        category_id: Option<CategoryId>,
    ) -> Result<Tag, AppError> {
        require_superuser(ctx)?;
        let name = required_name(name, "Tag")?;
        let mut tree = self.deps.repo.write().await;
        if let Some(category) = category_id {
            tree.category(category)?;
        }
        let tag = Tag {
            id: TagId::new(),
            name,
            color,
            category_id,
        };
        tree.tags.insert(tag.id, tag.clone());
        drop(tree);

        info!(user_id = %ctx.user_id, tag_id = %tag.id, name = %tag.name, "Tag created");
        Ok(tag)
    }

    pub async fn list_tags(&self) -> Vec<Tag> {
        let tree = self.deps.repo.read().await;
        let mut tags: Vec<Tag> = tree.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    pub async fn list_categories(&self) -> Vec<Category> {
        let tree = self.deps.repo.read().await;
        let mut categories: Vec<Category> = tree.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        categories
    }

    /// Deletes a tag and detaches it from every node.
    pub async fn delete_tag(&self, ctx: &RequestContext, id: TagId) -> Result<(), AppError> {
        require_superuser(ctx)?;
        let mut tree = self.deps.repo.write().await;
        tree.tag(id)?;
        tree.tags.remove(&id);

        let mut detached = Vec::new();
        for dir in tree.directories.values_mut() {
            if dir.node.tags.remove(&id) {
                detached.push(dir.node_ref());
            }
        }
        for file in tree.files.values_mut() {
            if file.node.tags.remove(&id) {
                detached.push(file.node_ref());
            }
        }
        drop(tree);

        info!(user_id = %ctx.user_id, tag_id = %id, nodes = detached.len(), "Tag deleted");
        for node in detached {
            self.deps.notifier.notify(ChangeEvent::new(
                node,
                ChangeKind::MetadataUpdated,
                ["tags"],
                Some(ctx.user_id),
                None,
            ));
        }
        Ok(())
    }

    /// Updates color, tags, and category of a node.
    pub async fn update_metadata(
        &self,
        ctx: &RequestContext,
        node: NodeRef,
        update: MetadataUpdate,
    ) -> Result<NodeInfo, AppError> {
        let op = self.deps.locks.begin(ctx);
        let mut tree = self.deps.repo.write().await;
        self.deps.require(ctx, &tree, node, Permission::Write)?;
        if update.is_empty() {
            return Ok(tree.node_info(node)?.clone());
        }
        self.deps.ensure_unlocked(&op, node)?;
        validate_references(&tree, &update)?;

        let meta = tree.node_info_mut(node)?;
        let mut changed = Vec::new();
        if let Some(color) = update.color {
            if meta.color != color {
                meta.color = color;
                changed.push("color");
            }
        }
        if let Some(tags) = update.tags {
            if meta.tags != tags {
                meta.tags = tags;
                changed.push("tags");
            }
        }
        if let Some(category_id) = update.category_id {
            if meta.category_id != category_id {
                meta.category_id = category_id;
                changed.push("category_id");
            }
        }
        if !changed.is_empty() {
            meta.touch();
        }
        let updated = meta.clone();
        drop(tree);

        if !changed.is_empty() {
            info!(user_id = %ctx.user_id, node = %node, fields = ?changed, "Node metadata updated");
            self.deps.notifier.notify(ChangeEvent::new(
                node,
                ChangeKind::MetadataUpdated,
                changed,
                Some(ctx.user_id),
                Some(op.id()),
            ));
        }
        Ok(updated)
    }
}

fn validate_references(tree: &TreeState, update: &MetadataUpdate) -> Result<(), AppError> {
    if let Some(tags) = &update.tags {
        for tag in tags {
            tree.tag(*tag)?;
        }
    }
    if let Some(Some(category)) = update.category_id {
        tree.category(category)?;
    }
    Ok(())
}

fn required_name(name: &str, what: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation(format!("{what} name cannot be empty")));
    }
    Ok(name.to_string())
}

fn require_superuser(ctx: &RequestContext) -> Result<(), AppError> {
    if ctx.is_superuser {
        Ok(())
    } else {
        Err(AppError::access("Only superusers can manage tags and categories"))
    }
}
