//! Content store implementations.

pub mod database;
pub mod local;

pub use database::DatabaseContentStore;
pub use local::LocalContentStore;
