//! Integration tests for file operations.

use dms_service::CreateFileRequest;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_duplicate_file_name_keeps_extension() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;

    let first = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "report.pdf"))
        .await
        .unwrap();
    let second = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "report.pdf"))
        .await
        .unwrap();

    assert_eq!(first.name(), "report.pdf");
    assert_eq!(second.name(), "report(1).pdf");
    assert_eq!(second.extension.as_deref(), Some("pdf"));
}

#[tokio::test]
async fn test_invalid_names_are_rejected() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;

    for name in ["", "a/b", "..", " padded", "what?"] {
        let err = app
            .dms
            .files
            .create_file(&app.editor, CreateFileRequest::new(root.id, name))
            .await
            .unwrap_err();
        assert!(err.is_validation(), "{name:?} should be rejected");
    }
}

#[tokio::test]
async fn test_rename_file_rederives_extension() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "notes.txt"))
        .await
        .unwrap();

    let renamed = app
        .dms
        .files
        .rename_file(&app.editor, file.id, "notes.json")
        .await
        .unwrap();
    assert_eq!(renamed.path(), "/Root/notes.json");
    assert_eq!(renamed.extension.as_deref(), Some("json"));
    assert_eq!(renamed.mimetype, "application/json");
}

#[tokio::test]
async fn test_move_file_into_taken_name_fails() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let sub = app.child(&root, "Sub").await;
    let top = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap();
    app.dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(sub.id, "a.txt"))
        .await
        .unwrap();

    let err = app
        .dms
        .files
        .move_file(&app.editor, top.id, sub.id)
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_copy_file_gets_independent_content() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let original = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt").with_content("hello"))
        .await
        .unwrap();

    let copy = app
        .dms
        .files
        .copy_file(&app.editor, original.id, root.id)
        .await
        .unwrap();
    assert_eq!(copy.name(), "a(1).txt");
    assert_eq!(copy.checksum, original.checksum);

    app.dms
        .content
        .write_content(&app.editor, copy.id, "changed".into())
        .await
        .unwrap();
    let data = app.dms.content.read_content(&app.editor, original.id).await.unwrap();
    assert_eq!(&data[..], b"hello");
}

#[tokio::test]
async fn test_delete_file_updates_parent_size() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt").with_content("hello"))
        .await
        .unwrap();

    app.dms.files.delete_file(&app.editor, file.id).await.unwrap();

    let root = app.dms.directories.get_directory(&app.editor, root.id).await.unwrap();
    assert_eq!(root.counts.count_files, 0);
    assert_eq!(root.counts.size, 0);
}

#[tokio::test]
async fn test_viewer_cannot_create_files() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;

    let err = app
        .dms
        .files
        .create_file(&app.viewer, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap_err();
    assert!(err.is_access());
}

#[tokio::test]
async fn test_forbidden_extensions_are_rejected() {
    let app = TestApp::with_config(|config| config.content.forbidden_extensions = vec!["exe".into()]).await;
    let root = app.root("Root").await;

    for name in ["setup.exe", "SETUP.EXE"] {
        let err = app
            .dms
            .files
            .create_file(&app.editor, CreateFileRequest::new(root.id, name))
            .await
            .unwrap_err();
        assert!(err.is_validation(), "{name} should be rejected");
    }

    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "setup.txt"))
        .await
        .unwrap();
    let err = app
        .dms
        .files
        .rename_file(&app.editor, file.id, "setup.exe")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let file = app.dms.files.get_file(&app.editor, file.id).await.unwrap();
    assert_eq!(file.name(), "setup.txt");
    let listing = app.dms.directories.list_children(&app.editor, root.id).await.unwrap();
    assert_eq!(listing.files.len(), 1);
}
