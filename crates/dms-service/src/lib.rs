//! # dms-service
//!
//! Tree operations for the document management core. Services validate
//! and apply every mutation against one shared node repository, hold
//! logical locks for the nodes they touch, re-derive computed fields
//! through the [`RecomputeEngine`], and publish a [`ChangeEvent`] per
//! affected node.
//!
//! Services follow constructor injection. All of them share one
//! [`ServiceDeps`] and are bundled by [`DocumentManager`].
//!
//! [`ChangeEvent`]: dms_core::events::ChangeEvent

pub mod context;
pub mod deps;
pub mod directory;
pub mod file;
pub mod lock;
pub mod manager;
pub mod naming;
pub mod notification;
pub mod permission;
pub mod recompute;
pub mod repository;
pub mod storage;
pub mod taxonomy;

pub use context::RequestContext;
pub use deps::ServiceDeps;
pub use directory::{Breadcrumb, CopyTarget, CreateDirectoryRequest, DirectoryListing, DirectoryService};
pub use file::{ContentService, CreateFileRequest, FileService};
pub use lock::{LockManager, LockService, Operation};
pub use manager::DocumentManager;
pub use notification::ChangeNotifier;
pub use permission::PermissionService;
pub use recompute::{ChangeSet, DerivedField, FieldSet, RecomputeEngine};
pub use repository::{NodeRepository, Placement, TreeState};
pub use storage::{MigrationCandidate, MigrationReport, StorageService, StorageSummary};
pub use taxonomy::{MetadataUpdate, TaxonomyService};
