//! Integration tests for directory operations.

use dms_core::types::NodeRef;
use dms_service::{CopyTarget, CreateDirectoryRequest, CreateFileRequest};

use crate::helpers::TestApp;

#[tokio::test]
async fn test_nested_file_derives_path_counts_and_checksum() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let sub = app.child(&root, "Sub").await;

    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(sub.id, "a.txt").with_content("hello"))
        .await
        .unwrap();

    assert_eq!(file.path(), "/Root/Sub/a.txt");
    assert_eq!(file.size, 5);
    assert_eq!(
        file.checksum.as_deref(),
        Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
    );
    assert_eq!(file.extension.as_deref(), Some("txt"));
    assert_eq!(file.mimetype, "text/plain");

    let root = app.dms.directories.get_directory(&app.editor, root.id).await.unwrap();
    assert_eq!(root.counts.count_directories, 1);
    assert_eq!(root.counts.count_total_directories, 1);
    assert_eq!(root.counts.count_total_files, 1);
    assert_eq!(root.counts.size, 5);
}

#[tokio::test]
async fn test_duplicate_directory_name_gets_suffix() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let first = app.child(&root, "Docs").await;
    let second = app.child(&root, "Docs").await;

    assert_eq!(first.name(), "Docs");
    assert_eq!(second.name(), "Docs(1)");
}

#[tokio::test]
async fn test_root_rename_updates_descendant_paths() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let sub = app.child(&root, "Sub").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(sub.id, "a.txt"))
        .await
        .unwrap();

    let renamed = app
        .dms
        .directories
        .rename_directory(&app.editor, root.id, "RootNew")
        .await
        .unwrap();
    assert_eq!(renamed.path(), "/RootNew/");

    let sub = app.dms.directories.get_directory(&app.editor, sub.id).await.unwrap();
    assert_eq!(sub.path(), "/RootNew/Sub/");
    let file = app.dms.files.get_file(&app.editor, file.id).await.unwrap();
    assert_eq!(file.path(), "/RootNew/Sub/a.txt");
}

#[tokio::test]
async fn test_rename_to_taken_name_fails() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    app.child(&root, "A").await;
    let b = app.child(&root, "B").await;

    let err = app
        .dms
        .directories
        .rename_directory(&app.editor, b.id, "A")
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let a = app.child(&root, "A").await;
    let b = app.child(&a, "B").await;

    let err = app
        .dms
        .directories
        .move_directory(&app.editor, a.id, b.id)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = app
        .dms
        .directories
        .move_directory(&app.editor, a.id, a.id)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let b = app.dms.directories.get_directory(&app.editor, b.id).await.unwrap();
    assert_eq!(b.path(), "/Root/A/B/");
}

#[tokio::test]
async fn test_move_updates_paths_and_both_parents_totals() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let src = app.child(&root, "Src").await;
    let dst = app.child(&root, "Dst").await;
    let moving = app.child(&src, "Moving").await;
    app.dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(moving.id, "x.bin").with_content(vec![0u8; 10]))
        .await
        .unwrap();

    let moved = app
        .dms
        .directories
        .move_directory(&app.editor, moving.id, dst.id)
        .await
        .unwrap();
    assert_eq!(moved.path(), "/Root/Dst/Moving/");
    assert_eq!(moved.parent_id, Some(dst.id));

    let src = app.dms.directories.get_directory(&app.editor, src.id).await.unwrap();
    let dst = app.dms.directories.get_directory(&app.editor, dst.id).await.unwrap();
    assert_eq!(src.counts.count_total_files, 0);
    assert_eq!(src.counts.size, 0);
    assert_eq!(dst.counts.count_total_files, 1);
    assert_eq!(dst.counts.size, 10);
}

#[tokio::test]
async fn test_copy_directory_duplicates_subtree() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let src = app.child(&root, "Src").await;
    let inner = app.child(&src, "Inner").await;
    let original = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(inner.id, "a.txt").with_content("hello"))
        .await
        .unwrap();

    let copy = app
        .dms
        .directories
        .copy_directory(&app.editor, src.id, CopyTarget::Directory(root.id))
        .await
        .unwrap();
    assert_eq!(copy.name(), "Src(1)");
    assert_eq!(copy.counts.count_total_files, 1);
    assert_eq!(copy.counts.size, 5);

    let node = app
        .dms
        .directories
        .find_by_path(&app.editor, app.storage, "/Root/Src(1)/Inner/a.txt")
        .await
        .unwrap();
    let NodeRef::File(copied_id) = node else {
        panic!("expected a file");
    };
    assert_ne!(copied_id, original.id);
    let copied = app.dms.content.read_content(&app.editor, copied_id).await.unwrap();
    assert_eq!(&copied[..], b"hello");

    let root = app.dms.directories.get_directory(&app.editor, root.id).await.unwrap();
    assert_eq!(root.counts.count_total_files, 2);
    assert_eq!(root.counts.size, 10);
}

#[tokio::test]
async fn test_delete_directory_removes_subtree_and_updates_totals() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let doomed = app.child(&root, "Doomed").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(doomed.id, "a.txt").with_content("hello"))
        .await
        .unwrap();

    app.dms
        .directories
        .delete_directory(&app.editor, doomed.id)
        .await
        .unwrap();

    let err = app.dms.files.get_file(&app.editor, file.id).await.unwrap_err();
    assert!(err.is_not_found());
    let root = app.dms.directories.get_directory(&app.editor, root.id).await.unwrap();
    assert_eq!(root.counts.count_total_files, 0);
    assert_eq!(root.counts.count_directories, 0);
    assert_eq!(root.counts.size, 0);
}

#[tokio::test]
async fn test_non_superuser_cannot_create_root() {
    let app = TestApp::new().await;
    let err = app
        .dms
        .directories
        .create_directory(&app.editor, CreateDirectoryRequest::root(app.storage, "Mine"))
        .await
        .unwrap_err();
    assert!(err.is_access());
}

#[tokio::test]
async fn test_breadcrumbs_are_root_first() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let a = app.child(&root, "A").await;
    let b = app.child(&a, "B").await;

    let crumbs = app
        .dms
        .directories
        .breadcrumbs(&app.editor, NodeRef::Directory(b.id))
        .await
        .unwrap();
    let names: Vec<_> = crumbs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Root", "A"]);
}
