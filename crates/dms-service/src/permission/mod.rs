//! Permission queries and access group administration.

pub mod service;

pub use service::PermissionService;
