//! Integration tests for the document management core.

mod helpers;

mod content_test;
mod directory_test;
mod file_test;
mod lock_test;
mod notification_test;
mod permission_test;
mod storage_test;
