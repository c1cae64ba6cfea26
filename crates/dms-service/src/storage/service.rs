//! Storage administration.

use serde::{Deserialize, Serialize};
use tracing::info;

use dms_core::error::AppError;
use dms_core::types::{FileId, SaveType, StorageId};
use dms_entity::{CreateStorage, Storage};

use crate::context::RequestContext;
use crate::deps::ServiceDeps;
use crate::repository::TreeState;

use super::migration::{MigrationCandidate, MigrationReport, migrate_files};

/// A storage with its tree counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSummary {
    /// The storage.
    pub storage: Storage,
    /// Root directories bound to it.
    pub count_root_directories: u64,
    /// All directories, roots included.
    pub count_directories: u64,
    /// All files.
    pub count_files: u64,
    /// Sum of all file sizes in bytes.
    pub size: u64,
}

/// Manages storages and their content backends.
#[derive(Debug, Clone)]
pub struct StorageService {
    deps: ServiceDeps,
    default_save_type: SaveType,
}

impl StorageService {
    /// Creates a new storage service. Storages created without a backend
    /// write to `default_save_type`.
    pub fn new(deps: ServiceDeps, default_save_type: SaveType) -> Self {
        Self {
            deps,
            default_save_type,
        }
    }

    /// Creates a storage. Superusers only.
    pub async fn create_storage(&self, ctx: &RequestContext, req: CreateStorage) -> Result<Storage, AppError> {
        require_superuser(ctx, "create storages")?;
        if req.name.trim().is_empty() {
            return Err(AppError::validation("Storage name cannot be empty"));
        }
        let storage = Storage::new(CreateStorage {
            save_type: Some(req.save_type.unwrap_or(self.default_save_type)),
            ..req
        });
        let mut tree = self.deps.repo.write().await;
        tree.storages.insert(storage.id, storage.clone());
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            storage_id = %storage.id,
            name = %storage.name,
            save_type = %storage.save_type,
            "Storage created"
        );
        Ok(storage)
    }

    /// Gets a storage with its counters.
    pub async fn get_storage(&self, ctx: &RequestContext, id: StorageId) -> Result<StorageSummary, AppError> {
        let tree = self.deps.repo.read().await;
        let storage = tree.storage(id)?;
        if !ctx.is_superuser && !storage.is_visible_to(&ctx.company_ids) {
            return Err(AppError::not_found(format!("Storage {id} not found")));
        }
        summarize(&tree, storage)
    }

    /// Lists the storages visible to the actor.
    pub async fn list_storages(&self, ctx: &RequestContext, include_hidden: bool) -> Result<Vec<StorageSummary>, AppError> {
        let tree = self.deps.repo.read().await;
        let mut storages = tree
            .storages
            .values()
            .filter(|s| ctx.is_superuser || s.is_visible_to(&ctx.company_ids))
            .filter(|s| include_hidden || ctx.is_superuser || !s.is_hidden)
            .map(|s| summarize(&tree, s))
            .collect::<Result<Vec<_>, _>>()?;
        storages.sort_by(|a, b| a.storage.name.cmp(&b.storage.name));
        Ok(storages)
    }

    /// Selects the backend new content is written to. Existing content
    /// stays where it is until [`migrate`](Self::migrate) runs.
    pub async fn set_save_type(
        &self,
        ctx: &RequestContext,
        id: StorageId,
        save_type: SaveType,
    ) -> Result<Storage, AppError> {
        require_superuser(ctx, "change storage backends")?;
        self.deps.content.get(save_type).await?;

        let mut tree = self.deps.repo.write().await;
        let storage = tree.storage_mut(id)?;
        let previous = std::mem::replace(&mut storage.save_type, save_type);
        storage.updated_at = chrono::Utc::now();
        let storage = storage.clone();
        let pending = pending_files(&tree, id)?.len();
        drop(tree);

        info!(
            user_id = %ctx.user_id,
            storage_id = %id,
            from = %previous,
            to = %save_type,
            pending,
            "Storage save type changed"
        );
        Ok(storage)
    }

    /// Files whose content lives outside the storage's backend.
    pub async fn files_requiring_migration(
        &self,
        ctx: &RequestContext,
        id: StorageId,
    ) -> Result<Vec<MigrationCandidate>, AppError> {
        require_superuser(ctx, "inspect storage migrations")?;
        let tree = self.deps.repo.read().await;
        let target = tree.storage(id)?.save_type;
        pending_files(&tree, id)?
            .into_iter()
            .map(|file_id| {
                let file = tree.file(file_id)?;
                Ok(MigrationCandidate {
                    file_id,
                    path: file.path().to_string(),
                    migration: file.migration_label(target).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Moves content into the storage's backend. Without `files`, every
    /// pending file is migrated. With `files`, exactly those files are
    /// considered and ones already in the target backend come back as
    /// skipped; files outside the storage are ignored.
    pub async fn migrate(
        &self,
        ctx: &RequestContext,
        id: StorageId,
        files: Option<Vec<FileId>>,
    ) -> Result<MigrationReport, AppError> {
        require_superuser(ctx, "migrate storage content")?;
        let (target, candidates) = {
            let tree = self.deps.repo.read().await;
            let target = tree.storage(id)?.save_type;
            let candidates = match files {
                Some(files) => tree
                    .files_in_storage(id)?
                    .into_iter()
                    .filter(|file| files.contains(file))
                    .collect(),
                None => pending_files(&tree, id)?,
            };
            (target, candidates)
        };
        self.deps.content.get(target).await?;

        let op = self.deps.locks.begin_system();
        let report = migrate_files(&self.deps, &op, candidates, target).await;
        info!(
            user_id = %ctx.user_id,
            storage_id = %id,
            operation_id = %op.id(),
            migrated = report.migrated.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Storage migration finished"
        );
        Ok(report)
    }
}

fn require_superuser(ctx: &RequestContext, action: &str) -> Result<(), AppError> {
    if ctx.is_superuser {
        Ok(())
    } else {
        Err(AppError::access(format!("Only superusers can {action}")))
    }
}

fn pending_files(tree: &TreeState, id: StorageId) -> Result<Vec<FileId>, AppError> {
    let target = tree.storage(id)?.save_type;
    let mut pending = Vec::new();
    for file_id in tree.files_in_storage(id)? {
        if tree.file(file_id)?.requires_migration(target) {
            pending.push(file_id);
        }
    }
    Ok(pending)
}

fn summarize(tree: &TreeState, storage: &Storage) -> Result<StorageSummary, AppError> {
    let mut summary = StorageSummary {
        storage: storage.clone(),
        count_root_directories: storage.root_directory_ids.len() as u64,
        count_directories: 0,
        count_files: 0,
        size: 0,
    };
    for root in &storage.root_directory_ids {
        let counts = tree.directory(*root)?.counts;
        summary.count_directories += 1 + counts.count_total_directories;
        summary.count_files += counts.count_total_files;
        summary.size += counts.size;
    }
    Ok(summary)
}
