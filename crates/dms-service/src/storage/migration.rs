//! Moving file content into a storage's configured backend.
//!
//! Each file migrates on its own: lock it under a system operation, copy
//! the bytes into the target backend, swap the reference under the write
//! guard, and delete the old bytes. Files whose content is already present
//! in the target backend are skipped, so an interrupted run can simply be
//! repeated.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use dms_core::error::AppError;
use dms_core::events::ChangeKind;
use dms_core::types::{ContentRef, FileId, NodeRef, SaveType};
use dms_entity::ContentInfo;

use crate::deps::ServiceDeps;
use crate::lock::Operation;

/// A file whose content lives outside its storage's backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationCandidate {
    /// The file.
    pub file_id: FileId,
    /// Its path.
    pub path: String,
    /// Human-readable label such as `"database > file"`.
    pub migration: String,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Files whose content now lives in the target backend.
    pub migrated: Vec<FileId>,
    /// Files left alone: locked by another holder, already migrated, or
    /// changed while being migrated.
    pub skipped: Vec<FileId>,
    /// Files whose content could not be copied.
    pub failed: Vec<FileId>,
}

pub(crate) enum Outcome {
    Migrated,
    Skipped,
}

/// Migrate one file. `Ok(Skipped)` means nothing was changed.
pub(crate) async fn migrate_file(
    deps: &ServiceDeps,
    op: &Operation,
    id: FileId,
    target: SaveType,
) -> Result<Outcome, AppError> {
    let node = NodeRef::File(id);
    if deps.locks.guard(node, op.holder(), op.id()).is_err() {
        debug!(file_id = %id, "Migration skipped: file is locked");
        return Ok(Outcome::Skipped);
    }

    let source = {
        let tree = deps.repo.read().await;
        tree.file(id)?.content.clone()
    };
    let Some(source) = source else {
        return Ok(Outcome::Skipped);
    };
    if source.content_ref.backend == target {
        if deps.content.contains(&source.content_ref).await? {
            return Ok(Outcome::Skipped);
        }
        return Err(AppError::storage(format!(
            "Content {} of file {id} is missing from its backend",
            source.content_ref
        ))
        .for_node(node));
    }

    let data = deps.content.read(&source.content_ref).await?;
    let new_ref = deps.content.put(target, data).await?;

    let swapped = {
        let mut tree = deps.repo.write().await;
        match tree.file_mut(id) {
            Ok(file) if file.content.as_ref() == Some(&source) => {
                file.content = Some(ContentInfo {
                    content_ref: new_ref.clone(),
                    ..source.clone()
                });
                true
            }
            _ => false,
        }
    };

    if !swapped {
        discard(deps, new_ref).await;
        return Ok(Outcome::Skipped);
    }
    discard(deps, source.content_ref).await;
    deps.notifier.publish(
        node,
        ChangeKind::Migrated,
        &["content"],
        Default::default(),
        None,
        Some(op.id()),
    );
    Ok(Outcome::Migrated)
}

async fn discard(deps: &ServiceDeps, content: ContentRef) {
    if let Err(e) = deps.content.delete(&content).await {
        warn!(content = %content, error = %e, "Failed to delete migrated content");
    }
}

/// Migrate a batch of files, recording each outcome.
pub(crate) async fn migrate_files(
    deps: &ServiceDeps,
    op: &Operation,
    files: Vec<FileId>,
    target: SaveType,
) -> MigrationReport {
    let mut report = MigrationReport::default();
    for id in files {
        let outcome = migrate_file(deps, op, id, target).await;
        deps.locks.release(NodeRef::File(id), op.id());
        match outcome {
            Ok(Outcome::Migrated) => report.migrated.push(id),
            Ok(Outcome::Skipped) => report.skipped.push(id),
            Err(e) => {
                warn!(file_id = %id, error = %e, "File migration failed");
                report.failed.push(id);
            }
        }
    }
    report
}
