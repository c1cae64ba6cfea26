//! Integration tests for access groups and permission evaluation.

use std::collections::BTreeSet;

use dms_core::types::{NodeRef, RoleId, UserId};
use dms_entity::{CreateAccessGroup, Permission, PermissionSet};
use dms_service::{CreateDirectoryRequest, CreateFileRequest, RequestContext};

use crate::helpers::TestApp;

#[tokio::test]
async fn test_children_inherit_root_groups() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let sub = app.child(&root, "Sub").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(sub.id, "a.txt"))
        .await
        .unwrap();

    assert_eq!(file.access_group_ids, BTreeSet::from([app.editors, app.readers]));
    let perms = app
        .dms
        .permissions
        .permissions(&app.viewer, NodeRef::File(file.id))
        .await
        .unwrap();
    assert_eq!(perms, PermissionSet::read_only());
}

#[tokio::test]
async fn test_revoking_group_propagates_to_descendants() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let sub = app.child(&root, "Sub").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(sub.id, "a.txt"))
        .await
        .unwrap();

    app.dms
        .directories
        .set_access_groups(&app.admin, root.id, BTreeSet::from([app.editors]), true)
        .await
        .unwrap();

    let err = app.dms.files.get_file(&app.viewer, file.id).await.unwrap_err();
    assert!(err.is_access());
    let file = app.dms.files.get_file(&app.editor, file.id).await.unwrap();
    assert_eq!(file.access_group_ids, BTreeSet::from([app.editors]));
}

#[tokio::test]
async fn test_non_inheriting_directory_uses_only_its_own_groups() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let mut req = CreateDirectoryRequest::child(root.id, "Private").with_groups([app.editors]);
    req.inherit_access_groups = false;
    let private = app
        .dms
        .directories
        .create_directory(&app.editor, req)
        .await
        .unwrap();

    assert_eq!(private.access.effective, BTreeSet::from([app.editors]));
    let allowed = app
        .dms
        .permissions
        .check_access(&app.viewer, NodeRef::Directory(private.id), Permission::Read)
        .await
        .unwrap();
    assert!(!allowed);

    let listing = app
        .dms
        .directories
        .list_children(&app.viewer, root.id)
        .await
        .unwrap();
    assert!(listing.directories.is_empty());
}

#[tokio::test]
async fn test_deleting_group_revokes_access() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;

    app.dms
        .permissions
        .delete_group(&app.admin, app.readers)
        .await
        .unwrap();

    let root = app.dms.directories.get_directory(&app.admin, root.id).await.unwrap();
    assert!(!root.access.explicit.contains(&app.readers));
    assert!(!root.access.effective.contains(&app.readers));
    let err = app
        .dms
        .directories
        .get_directory(&app.viewer, root.id)
        .await
        .unwrap_err();
    assert!(err.is_access());
}

#[tokio::test]
async fn test_role_members_gain_access() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let role = RoleId::new();
    let auditors = app
        .dms
        .permissions
        .create_group(
            &app.admin,
            CreateAccessGroup {
                name: "Auditors".into(),
                permissions: PermissionSet::read_only(),
                role_groups: [role].into(),
                ..CreateAccessGroup::default()
            },
        )
        .await
        .unwrap();
    app.dms
        .directories
        .set_access_groups(&app.admin, root.id, BTreeSet::from([app.editors, auditors.id]), true)
        .await
        .unwrap();

    let auditor = RequestContext::new(UserId::new());
    let node = NodeRef::Directory(root.id);
    assert!(
        !app.dms
            .permissions
            .check_access(&auditor, node, Permission::Read)
            .await
            .unwrap()
    );

    app.dms.permissions.set_role_members(role, [auditor.user_id]);
    assert!(
        app.dms
            .permissions
            .check_access(&auditor, node, Permission::Read)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_permissions_batch_skips_missing_nodes() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let missing = NodeRef::File(dms_core::types::FileId::new());

    let batch = app
        .dms
        .permissions
        .permissions_batch(&app.editor, &[NodeRef::Directory(root.id), missing])
        .await
        .unwrap();
    assert_eq!(batch, vec![(NodeRef::Directory(root.id), PermissionSet::all())]);

    let writable = app
        .dms
        .permissions
        .filter_allowed(&app.viewer, &[NodeRef::Directory(root.id)], Permission::Write)
        .await
        .unwrap();
    assert!(writable.is_empty());
}

#[tokio::test]
async fn test_group_admin_requires_superuser() {
    let app = TestApp::new().await;
    let err = app
        .dms
        .permissions
        .create_group(&app.editor, CreateAccessGroup::default())
        .await
        .unwrap_err();
    assert!(err.is_access());
}
