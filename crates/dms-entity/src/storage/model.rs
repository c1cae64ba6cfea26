//! Storage policy model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dms_core::types::{CompanyId, DirectoryId, SaveType, StorageId};

/// A policy object bound to one or more root directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    /// Unique storage identifier.
    pub id: StorageId,
    /// Human-readable name.
    pub name: String,
    /// Backend that new content is written to.
    pub save_type: SaveType,
    /// Whether root directories are hidden from default listings.
    pub is_hidden: bool,
    /// Optional tenant partition.
    pub company_scope: Option<CompanyId>,
    /// Root directories bound to this storage.
    pub root_directory_ids: BTreeSet<DirectoryId>,
    /// When the storage was created.
    pub created_at: DateTime<Utc>,
    /// When the storage was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    /// Build a storage from a creation request.
    pub fn new(req: CreateStorage) -> Self {
        let now = Utc::now();
        Self {
            id: StorageId::new(),
            name: req.name,
            save_type: req.save_type.unwrap_or_default(),
            is_hidden: req.is_hidden,
            company_scope: req.company_scope,
            root_directory_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether an actor belonging to `companies` may see this storage.
    pub fn is_visible_to(&self, companies: &BTreeSet<CompanyId>) -> bool {
        self.company_scope
            .map(|company| companies.contains(&company))
            .unwrap_or(true)
    }
}

/// Data required to create a new storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStorage {
    /// Human-readable name.
    pub name: String,
    /// Backend selection. Left empty, the configured default applies.
    #[serde(default)]
    pub save_type: Option<SaveType>,
    /// Default visibility.
    pub is_hidden: bool,
    /// Optional tenant partition.
    pub company_scope: Option<CompanyId>,
}
