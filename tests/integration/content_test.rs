//! Integration tests for file content I/O.

use bytes::Bytes;

use dms_service::CreateFileRequest;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_write_then_read_round_trips() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap();
    assert_eq!(file.size, 0);
    assert!(file.checksum.is_none());

    let empty = app.dms.content.read_content(&app.editor, file.id).await.unwrap();
    assert!(empty.is_empty());

    let written = app
        .dms
        .content
        .write_content(&app.editor, file.id, Bytes::from_static(b"hello"))
        .await
        .unwrap();
    assert_eq!(written.size, 5);
    assert_eq!(
        written.checksum.as_deref(),
        Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
    );

    let data = app.dms.content.read_content(&app.viewer, file.id).await.unwrap();
    assert_eq!(data, Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn test_base64_write_and_clear() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap();

    let written = app
        .dms
        .content
        .write_content_base64(&app.editor, file.id, "aGVsbG8=")
        .await
        .unwrap();
    assert_eq!(written.size, 5);

    let err = app
        .dms
        .content
        .write_content_base64(&app.editor, file.id, "not base64!")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let cleared = app.dms.content.clear_content(&app.editor, file.id).await.unwrap();
    assert_eq!(cleared.size, 0);
    assert!(cleared.checksum.is_none());
    let root = app.dms.directories.get_directory(&app.editor, root.id).await.unwrap();
    assert_eq!(root.counts.size, 0);
}

#[tokio::test]
async fn test_viewer_cannot_write() {
    let app = TestApp::new().await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap();

    let err = app
        .dms
        .content
        .write_content(&app.viewer, file.id, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(err.is_access());
}

#[tokio::test]
async fn test_local_backend_round_trips() {
    let app = TestApp::with_save_type(dms_core::types::SaveType::File).await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt").with_content("on disk"))
        .await
        .unwrap();

    let data = app.dms.content.read_content(&app.editor, file.id).await.unwrap();
    assert_eq!(&data[..], b"on disk");
}

#[tokio::test]
async fn test_size_limit_applies_to_decoded_content() {
    let app = TestApp::with_config(|config| config.content.max_upload_size_bytes = 8).await;
    let root = app.root("Root").await;
    let file = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "a.txt"))
        .await
        .unwrap();

    let err = app
        .dms
        .content
        .write_content(&app.editor, file.id, Bytes::from_static(b"123456789"))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    // 12 encoded characters, 8 decoded bytes
    let written = app
        .dms
        .content
        .write_content_base64(&app.editor, file.id, "MTIzNDU2Nzg=")
        .await
        .unwrap();
    assert_eq!(written.size, 8);

    let err = app
        .dms
        .content
        .write_content_base64(&app.editor, file.id, "MTIzNDU2Nzg5")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let data = app.dms.content.read_content(&app.editor, file.id).await.unwrap();
    assert_eq!(&data[..], b"12345678");

    let err = app
        .dms
        .files
        .create_file(&app.editor, CreateFileRequest::new(root.id, "big.txt").with_content("123456789"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
