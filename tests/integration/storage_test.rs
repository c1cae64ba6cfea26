//! Integration tests for storages and content migration.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::traits::ContentStore;
use dms_core::types::{CompanyId, ContentRef, NodeRef, SaveType};
use dms_entity::CreateStorage;
use dms_service::{CreateDirectoryRequest, CreateFileRequest, RequestContext};
use dms_storage::providers::LocalContentStore;

use crate::helpers::TestApp;

/// Filesystem backend that refuses content starting with `reject`.
#[derive(Debug)]
struct RejectingStore {
    inner: LocalContentStore,
}

#[async_trait]
impl ContentStore for RejectingStore {
    fn save_type(&self) -> SaveType {
        SaveType::File
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }

    async fn put(&self, data: Bytes) -> AppResult<ContentRef> {
        if data.starts_with(b"reject") {
            return Err(AppError::storage("Backend refused the write"));
        }
        self.inner.put(data).await
    }

    async fn get(&self, content: &ContentRef) -> AppResult<Bytes> {
        self.inner.get(content).await
    }

    async fn delete(&self, content: &ContentRef) -> AppResult<()> {
        self.inner.delete(content).await
    }

    async fn contains(&self, content: &ContentRef) -> AppResult<bool> {
        self.inner.contains(content).await
    }
}

#[tokio::test]
async fn test_migration_moves_content_between_backends() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let a = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt").with_content("alpha"))
        .await
        .unwrap();
    let b = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "b.txt").with_content("beta"))
        .await
        .unwrap();
    // never written, nothing to move
    app.dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "empty.txt"))
        .await
        .unwrap();

    app.dms
        .storages
        .set_save_type(&app.admin, app.storage, SaveType::File)
        .await
        .unwrap();
    let pending = app
        .dms
        .storages
        .files_requiring_migration(&app.admin, app.storage)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|c| c.migration == "database > file"));

    let report = app
        .dms
        .storages
        .migrate(&app.admin, app.storage, None)
        .await
        .unwrap();
    assert_eq!(report.migrated.len(), 2);
    assert!(report.failed.is_empty());

    let a = app.dms.files.get_file(&app.editor, a.id).await.unwrap();
    assert_eq!(a.content_backend(), Some(SaveType::File));
    let data = app.dms.content.read_content(&app.editor, b.id).await.unwrap();
    assert_eq!(&data[..], b"beta");

    let pending = app
        .dms
        .storages
        .files_requiring_migration(&app.admin, app.storage)
        .await
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_migration_skips_locked_files() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt").with_content("alpha"))
        .await
        .unwrap();
    app.dms
        .locks
        .lock_node(&app.editor, NodeRef::File(file.id))
        .await
        .unwrap();

    app.dms
        .storages
        .set_save_type(&app.admin, app.storage, SaveType::File)
        .await
        .unwrap();
    let report = app
        .dms
        .storages
        .migrate(&app.admin, app.storage, None)
        .await
        .unwrap();
    assert_eq!(report.skipped, vec![file.id]);

    let file = app.dms.files.get_file(&app.editor, file.id).await.unwrap();
    assert_eq!(file.content_backend(), Some(SaveType::Database));
}

#[tokio::test]
async fn test_storage_summary_counts_roots() {
    let app = TestApp::new().await;
    let first = app.root("First").await;
    app.root("Second").await;
    app.child(&first, "Inner").await;

    let summary = app
        .dms
        .storages
        .get_storage(&app.admin, app.storage)
        .await
        .unwrap();
    assert_eq!(summary.count_root_directories, 2);
    assert_eq!(summary.count_directories, 3);
    assert_eq!(summary.count_files, 0);
}

#[tokio::test]
async fn test_company_scoped_storage_is_invisible_to_outsiders() {
    let app = TestApp::new().await;
    let company = CompanyId::new();
    let scoped = app
        .dms
        .storages
        .create_storage(
            &app.admin,
            CreateStorage {
                name: "Scoped".into(),
                save_type: Some(SaveType::Database),
                is_hidden: false,
                company_scope: Some(company),
            },
        )
        .await
        .unwrap();
    let root = app
        .dms
        .directories
        .create_directory(
            &app.admin,
            CreateDirectoryRequest::root(scoped.id, "Private").with_groups([app.editors]),
        )
        .await
        .unwrap();

    let err = app
        .dms
        .storages
        .get_storage(&app.editor, scoped.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = app
        .dms
        .directories
        .get_directory(&app.editor, root.id)
        .await
        .unwrap_err();
    assert!(err.is_access());

    let insider = RequestContext::new(app.editor.user_id).with_companies([company]);
    let dir = app.dms.directories.get_directory(&insider, root.id).await.unwrap();
    assert_eq!(dir.path(), "/Private/");
}

#[tokio::test]
async fn test_storage_admin_requires_superuser() {
    let app = TestApp::new().await;
    let err = app
        .dms
        .storages
        .set_save_type(&app.editor, app.storage, SaveType::File)
        .await
        .unwrap_err();
    assert!(err.is_access());
}

#[tokio::test]
async fn test_migration_failures_can_be_retried() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let good = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "good.txt").with_content("alpha"))
        .await
        .unwrap();
    let bad = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "bad.txt").with_content("reject me"))
        .await
        .unwrap();

    let file_dir = tempfile::tempdir().unwrap();
    let file_root = file_dir.path().to_string_lossy().into_owned();
    app.content
        .register(Arc::new(RejectingStore {
            inner: LocalContentStore::new(&file_root).await.unwrap(),
        }))
        .await;
    app.dms
        .storages
        .set_save_type(&app.admin, app.storage, SaveType::File)
        .await
        .unwrap();

    let report = app
        .dms
        .storages
        .migrate(&app.admin, app.storage, None)
        .await
        .unwrap();
    assert_eq!(report.migrated, vec![good.id]);
    assert_eq!(report.failed, vec![bad.id]);

    // the failed file still reads from its old backend
    let bad_file = app.dms.files.get_file(&app.editor, bad.id).await.unwrap();
    assert_eq!(bad_file.content_backend(), Some(SaveType::Database));
    let data = app.dms.content.read_content(&app.editor, bad.id).await.unwrap();
    assert_eq!(&data[..], b"reject me");

    // backend recovers, the rerun only moves what is left
    app.content
        .register(Arc::new(LocalContentStore::new(&file_root).await.unwrap()))
        .await;
    let report = app
        .dms
        .storages
        .migrate(&app.admin, app.storage, Some(vec![good.id, bad.id]))
        .await
        .unwrap();
    assert_eq!(report.migrated, vec![bad.id]);
    assert_eq!(report.skipped, vec![good.id]);
    assert!(report.failed.is_empty());

    let data = app.dms.content.read_content(&app.editor, good.id).await.unwrap();
    assert_eq!(&data[..], b"alpha");
    let data = app.dms.content.read_content(&app.editor, bad.id).await.unwrap();
    assert_eq!(&data[..], b"reject me");
}

#[tokio::test]
async fn test_new_storage_takes_configured_backend() {
    let app = TestApp::with_config(|config| config.content.default_save_type = SaveType::File).await;
    let summary = app
        .dms
        .storages
        .get_storage(&app.admin, app.storage)
        .await
        .unwrap();
    assert_eq!(summary.storage.save_type, SaveType::File);

    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt").with_content("alpha"))
        .await
        .unwrap();
    assert_eq!(file.content_backend(), Some(SaveType::File));
}

#[tokio::test]
async fn test_hidden_storage_roots_need_opt_in() {
    let app = TestApp::new().await;
    app.root("Visible").await;
    let hidden = app
        .dms
        .storages
        .create_storage(
            &app.admin,
            CreateStorage {
                name: "Archive".into(),
                save_type: None,
                is_hidden: true,
                company_scope: None,
            },
        )
        .await
        .unwrap();
    app.dms
        .directories
        .create_directory(
            &app.admin,
            CreateDirectoryRequest::root(hidden.id, "Hidden").with_groups([app.editors, app.readers]),
        )
        .await
        .unwrap();

    let names = |roots: Vec<dms_entity::Directory>| {
        roots
            .iter()
            .map(|root| root.name().to_string())
            .collect::<Vec<_>>()
    };

    let default = app
        .dms
        .directories
        .list_root_directories(&app.viewer, false)
        .await
        .unwrap();
    assert_eq!(names(default), vec!["Visible"]);

    let opted_in = app
        .dms
        .directories
        .list_root_directories(&app.viewer, true)
        .await
        .unwrap();
    assert_eq!(names(opted_in), vec!["Hidden", "Visible"]);

    let as_admin = app
        .dms
        .directories
        .list_root_directories(&app.admin, false)
        .await
        .unwrap();
    assert_eq!(names(as_admin), vec!["Hidden", "Visible"]);
}
