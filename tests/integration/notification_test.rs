//! Integration tests for change notifications.

use tokio::sync::broadcast::Receiver;

use dms_core::events::{ChangeEvent, ChangeKind};
use dms_core::types::NodeRef;
use dms_service::{CreateFileRequest, MetadataUpdate};

use crate::helpers::TestApp;

fn drain(rx: &mut Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_create_file_notifies_file_and_ancestors() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let sub = app.child(&root, "Sub").await;
    let mut rx = app.dms.subscribe();

    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(sub.id, "a.txt").with_content("hello"))
        .await
        .unwrap();
    let events = drain(&mut rx);

    let created = events
        .iter()
        .find(|e| e.node == NodeRef::File(file.id))
        .unwrap();
    assert_eq!(created.change, ChangeKind::Created);
    assert!(created.changed_fields.contains("path"));
    assert_eq!(created.actor, Some(app.editor.user_id));

    for dir in [sub.id, root.id] {
        let event = events
            .iter()
            .find(|e| e.node == NodeRef::Directory(dir))
            .unwrap();
        assert_eq!(event.change, ChangeKind::Recomputed);
        assert!(event.changed_fields.contains("size"));
    }
    // one operation per mutation
    assert!(events.iter().all(|e| e.operation_id == created.operation_id));
}

#[tokio::test]
async fn test_rename_notifies_descendants_with_path() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let sub = app.child(&root, "Sub").await;
    let mut rx = app.dms.subscribe();

    app.dms
        .directories
        .rename_directory(&app.editor, root.id, "Renamed")
        .await
        .unwrap();
    let events = drain(&mut rx);

    let primary = events
        .iter()
        .find(|e| e.node == NodeRef::Directory(root.id))
        .unwrap();
    assert_eq!(primary.change, ChangeKind::Renamed);
    assert!(primary.changed_fields.contains("name"));
    let child = events
        .iter()
        .find(|e| e.node == NodeRef::Directory(sub.id))
        .unwrap();
    assert_eq!(child.change, ChangeKind::Recomputed);
    assert!(child.changed_fields.contains("path"));
}

#[tokio::test]
async fn test_failed_mutation_emits_nothing() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let a = app.child(&root, "A").await;
    let mut rx = app.dms.subscribe();

    let result = app
        .dms
        .directories
        .move_directory(&app.editor, root.id, a.id)
        .await;
    assert!(result.is_err());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_metadata_update_reports_changed_fields() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let tag = app
        .dms
        .taxonomy
        .create_tag(&app.admin, "urgent", Some(1), None)
        .await
        .unwrap();
    let mut rx = app.dms.subscribe();

    let node = NodeRef::Directory(root.id);
    let info = app
        .dms
        .taxonomy
        .update_metadata(
            &app.editor,
            node,
            MetadataUpdate {
                color: Some(Some(3)),
                tags: Some([tag.id].into()),
                ..MetadataUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(info.color, Some(3));
    assert!(info.tags.contains(&tag.id));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].change, ChangeKind::MetadataUpdated);
    let fields: Vec<_> = events[0].changed_fields.iter().map(String::as_str).collect();
    assert_eq!(fields, ["color", "tags"]);

    app.dms.taxonomy.delete_tag(&app.admin, tag.id).await.unwrap();
    let dir = app.dms.directories.get_directory(&app.editor, root.id).await.unwrap();
    assert!(dir.node.tags.is_empty());
}

#[tokio::test]
async fn test_unknown_tag_is_rejected() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;

    let err = app
        .dms
        .taxonomy
        .update_metadata(
            &app.editor,
            NodeRef::Directory(root.id),
            MetadataUpdate {
                tags: Some([dms_core::types::TagId::new()].into()),
                ..MetadataUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
