//! Integration tests for locking, checkout, and delete safety.

use bytes::Bytes;

use dms_core::types::NodeRef;
use dms_entity::{LockHolder, LockState};
use dms_service::{CreateFileRequest, RequestContext};

use crate::helpers::TestApp;

#[tokio::test]
async fn test_concurrent_lock_has_one_winner() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap();
    let node = NodeRef::File(file.id);

    let mut handles = Vec::new();
    for i in 0..16 {
        let dms = app.dms.clone();
        let ctx = if i % 2 == 0 { app.editor.clone() } else { app.other_editor.clone() };
        handles.push(tokio::spawn(async move { dms.locks.lock_node(&ctx, node).await }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert!(e.is_access()),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_delete_fails_while_descendant_locked_by_other_user() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let sub = app.child(&root, "Sub").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(sub.id, "a.txt").with_content("hello"))
        .await
        .unwrap();
    app.dms
        .locks
        .lock_node(&app.editor, NodeRef::File(file.id))
        .await
        .unwrap();

    let err = app
        .dms
        .directories
        .delete_directory(&app.other_editor, sub.id)
        .await
        .unwrap_err();
    assert!(err.is_access());

    let sub = app.dms.directories.get_directory(&app.editor, sub.id).await.unwrap();
    assert!(sub.file_ids.contains(&file.id));
    let data = app.dms.content.read_content(&app.editor, file.id).await.unwrap();
    assert_eq!(&data[..], b"hello");
    // the failed delete must not leave partial locks behind
    assert!(
        !app.dms
            .lock_manager
            .lock_state(NodeRef::Directory(sub.id))
            .is_locked()
    );
}

#[tokio::test]
async fn test_rename_blocked_by_foreign_lock() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap();
    app.dms
        .locks
        .lock_node(&app.editor, NodeRef::File(file.id))
        .await
        .unwrap();

    let err = app
        .dms
        .files
        .rename_file(&app.other_editor, file.id, "b.txt")
        .await
        .unwrap_err();
    assert!(err.is_access());

    let renamed = app
        .dms
        .files
        .rename_file(&app.editor, file.id, "b.txt")
        .await
        .unwrap();
    assert_eq!(renamed.name(), "b.txt");
}

#[tokio::test]
async fn test_only_holder_can_unlock() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let node = NodeRef::Directory(root.id);
    app.dms.locks.lock_node(&app.editor, node).await.unwrap();

    let err = app
        .dms
        .locks
        .unlock_node(&app.other_editor, node)
        .await
        .unwrap_err();
    assert!(err.is_access());

    let state = app.dms.locks.lock_state(&app.viewer, node).await.unwrap();
    assert_eq!(
        state,
        LockState::Locked {
            holder: LockHolder::User(app.editor.user_id),
            operation_id: None,
        }
    );

    app.dms.locks.unlock_node(&app.editor, node).await.unwrap();
    let state = app.dms.locks.lock_state(&app.viewer, node).await.unwrap();
    assert_eq!(state, LockState::Unlocked);
}

#[tokio::test]
async fn test_checkout_checkin_cycle() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt").with_content("v1"))
        .await
        .unwrap();

    let token = app.dms.locks.checkout(&app.editor, file.id).await.unwrap();
    assert_eq!(token.len(), 43);

    let err = app
        .dms
        .content
        .write_content(&app.other_editor, file.id, Bytes::from_static(b"sneaky"))
        .await
        .unwrap_err();
    assert!(err.is_access());

    let updated = app
        .dms
        .locks
        .checkin(&token, Bytes::from_static(b"version two"))
        .await
        .unwrap();
    assert_eq!(updated.size, 11);
    assert!(
        !app.dms
            .lock_manager
            .lock_state(NodeRef::File(file.id))
            .is_locked()
    );

    let err = app
        .dms
        .locks
        .checkin(&token, Bytes::from_static(b"again"))
        .await
        .unwrap_err();
    assert!(err.is_access());
}

#[tokio::test]
async fn test_shared_operation_reuses_its_locks() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap();

    let op = app.dms.lock_manager.begin(&app.editor);
    let ctx = RequestContext::new(app.editor.user_id).with_operation(op.id());
    let renamed = app
        .dms
        .files
        .rename_file(&ctx, file.id, "b.txt")
        .await
        .unwrap();
    assert_eq!(renamed.name(), "b.txt");

    // the caller-supplied operation keeps its lock until it is dropped
    assert!(
        app.dms
            .lock_manager
            .lock_state(NodeRef::File(file.id))
            .is_locked()
    );
    drop(op);
    assert!(
        !app.dms
            .lock_manager
            .lock_state(NodeRef::File(file.id))
            .is_locked()
    );
}
