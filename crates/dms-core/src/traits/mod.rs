//! Core traits defined in `dms-core` and implemented by other crates.

pub mod content_store;

pub use content_store::ContentStore;
