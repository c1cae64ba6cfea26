//! Wires every service around one shared tree.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use dms_auth::{AccessChecker, AccessGroupRegistry};
use dms_core::config::DmsConfig;
use dms_core::error::AppError;
use dms_core::events::ChangeEvent;
use dms_storage::{ContentPolicy, ContentStoreRegistry};

use crate::deps::ServiceDeps;
use crate::directory::DirectoryService;
use crate::file::{ContentService, FileService};
use crate::lock::{LockManager, LockService};
use crate::notification::ChangeNotifier;
use crate::permission::PermissionService;
use crate::recompute::RecomputeEngine;
use crate::repository::NodeRepository;
use crate::storage::StorageService;
use crate::taxonomy::TaxonomyService;

/// Entry point to the document management core.
///
/// Every service shares the same repository, lock table, group registry,
/// content backends, and notifier.
#[derive(Debug, Clone)]
pub struct DocumentManager {
    pub directories: DirectoryService,
    pub files: FileService,
    pub content: ContentService,
    pub locks: LockService,
    pub storages: StorageService,
    pub permissions: PermissionService,
    pub taxonomy: TaxonomyService,
    /// Raw lock table, for hosts that run their own multi-step operations.
    pub lock_manager: Arc<LockManager>,
    pub notifier: Arc<ChangeNotifier>,
    pub registry: Arc<AccessGroupRegistry>,
}

impl DocumentManager {
    /// Builds the manager with content backends taken from `config`.
    pub async fn new(config: &DmsConfig) -> Result<Self, AppError> {
        let content = ContentStoreRegistry::from_config(&config.content).await?;
        Ok(Self::with_registry(config, Arc::new(content)))
    }

    /// Builds the manager around an existing set of content backends.
    pub fn with_registry(config: &DmsConfig, content: Arc<ContentStoreRegistry>) -> Self {
        let registry = Arc::new(AccessGroupRegistry::new());
        let lock_manager = Arc::new(LockManager::new());
        let notifier = Arc::new(ChangeNotifier::from_config(&config.notifications));

        let deps = ServiceDeps {
            repo: Arc::new(NodeRepository::new()),
            locks: Arc::clone(&lock_manager),
            access: Arc::new(AccessChecker::new(Arc::clone(&registry))),
            content,
            policy: Arc::new(ContentPolicy::from_config(&config.content)),
            notifier: Arc::clone(&notifier),
            engine: RecomputeEngine::new(),
        };

        let content = ContentService::new(deps.clone());
        let manager = Self {
            directories: DirectoryService::new(deps.clone()),
            files: FileService::new(deps.clone()),
            locks: LockService::new(deps.clone(), content.clone()),
            content,
            storages: StorageService::new(deps.clone(), config.content.default_save_type),
            permissions: PermissionService::new(deps.clone()),
            taxonomy: TaxonomyService::new(deps),
            lock_manager,
            notifier,
            registry,
        };
        info!(
            default_save_type = %config.content.default_save_type,
            "Document manager initialized"
        );
        manager
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
impl DocumentManager {
    /// A manager backed by the in-memory database store only.
    pub(crate) async fn in_memory() -> Self {
        let content = ContentStoreRegistry::new();
        content
            .register(Arc::new(dms_storage::providers::DatabaseContentStore::new()))
            .await;
        Self::with_registry(&DmsConfig::default(), Arc::new(content))
    }
}
