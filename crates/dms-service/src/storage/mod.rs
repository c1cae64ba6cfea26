//! Storage administration and content migration.

pub mod migration;
pub mod service;

pub use migration::{MigrationCandidate, MigrationReport};
pub use service::{StorageService, StorageSummary};
