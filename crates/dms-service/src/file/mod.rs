//! File operations and content I/O.

pub mod content;
pub mod service;

pub use content::ContentService;
pub use service::{CreateFileRequest, FileService};
