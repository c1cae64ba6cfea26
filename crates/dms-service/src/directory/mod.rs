//! Directory operations.

pub mod service;
pub mod tree;

pub use service::{Breadcrumb, CopyTarget, CreateDirectoryRequest, DirectoryListing, DirectoryService};
