//! Shared test helpers for integration tests.

use std::sync::Arc;

use tempfile::TempDir;

use dms_core::config::DmsConfig;
use dms_core::types::{AccessGroupId, SaveType, StorageId, UserId};
use dms_entity::{CreateAccessGroup, CreateStorage, Directory, PermissionSet};
use dms_service::{CreateDirectoryRequest, DocumentManager, RequestContext};
use dms_storage::ContentStoreRegistry;

/// Test application context
pub struct TestApp {
    /// The document manager under test
    pub dms: DocumentManager,
    /// Superuser context
    pub admin: RequestContext,
    /// Member of the editors group
    pub editor: RequestContext,
    /// Second member of the editors group
    pub other_editor: RequestContext,
    /// Member of the readers group only
    pub viewer: RequestContext,
    /// Full-permission group
    pub editors: AccessGroupId,
    /// Read-only group
    pub readers: AccessGroupId,
    /// Storage holding the test roots
    pub storage: StorageId,
    /// Content backends shared with the manager
    pub content: Arc<ContentStoreRegistry>,
    /// Keeps the local content directory alive
    _content_dir: TempDir,
}

impl TestApp {
    /// Create a new test application with database-backed content
    pub async fn new() -> Self {
        Self::with_save_type(SaveType::Database).await
    }

    /// Create a new test application whose storage writes to `save_type`
    pub async fn with_save_type(save_type: SaveType) -> Self {
        Self::build(Some(save_type), |_| {}).await
    }

    /// Create a new test application from an adjusted default config. The
    /// storage takes the configured default backend.
    pub async fn with_config(configure: impl FnOnce(&mut DmsConfig)) -> Self {
        Self::build(None, configure).await
    }

    async fn build(save_type: Option<SaveType>, configure: impl FnOnce(&mut DmsConfig)) -> Self {
        let content_dir = tempfile::tempdir().expect("Failed to create content dir");
        let mut config = DmsConfig::default();
        config.content.local.root_path = content_dir.path().to_string_lossy().into_owned();
        configure(&mut config);

        let content = Arc::new(
            ContentStoreRegistry::from_config(&config.content)
                .await
                .expect("Failed to init content stores"),
        );
        let dms = DocumentManager::with_registry(&config, Arc::clone(&content));

        let admin = RequestContext::superuser(UserId::new());
        let editor = RequestContext::new(UserId::new());
        let other_editor = RequestContext::new(UserId::new());
        let viewer = RequestContext::new(UserId::new());

        let editors = dms
            .permissions
            .create_group(
                &admin,
                CreateAccessGroup {
                    name: "Editors".into(),
                    permissions: PermissionSet::all(),
                    explicit_users: [editor.user_id, other_editor.user_id].into(),
                    ..CreateAccessGroup::default()
                },
            )
            .await
            .expect("Failed to create editors");
        let readers = dms
            .permissions
            .create_group(
                &admin,
                CreateAccessGroup {
                    name: "Readers".into(),
                    permissions: PermissionSet::read_only(),
                    explicit_users: [viewer.user_id].into(),
                    ..CreateAccessGroup::default()
                },
            )
            .await
            .expect("Failed to create readers");

        let storage = dms
            .storages
            .create_storage(
                &admin,
                CreateStorage {
                    name: "Main".into(),
                    save_type,
                    is_hidden: false,
                    company_scope: None,
                },
            )
            .await
            .expect("Failed to create storage");

        Self {
            dms,
            admin,
            editor,
            other_editor,
            viewer,
            editors: editors.id,
            readers: readers.id,
            storage: storage.id,
            content,
            _content_dir: content_dir,
        }
    }

    /// Create a root directory both test groups can see
    pub async fn root(&self, name: &str) -> Directory {
        self.dms
            .directories
            .create_directory(
                &self.admin,
                CreateDirectoryRequest::root(self.storage, name).with_groups([self.editors, self.readers]),
            )
            .await
            .expect("Failed to create root")
    }

    /// Create a child directory as the editor
    pub async fn child(&self, parent: &Directory, name: &str) -> Directory {
        self.dms
            .directories
            .create_directory(&self.editor, CreateDirectoryRequest::child(parent.id, name))
            .await
            .expect("Failed to create directory")
    }
}
