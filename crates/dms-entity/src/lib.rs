//! # dms-entity
//!
//! Domain entity models for the document management core. Every struct in
//! this crate is a plain record or value object; behavior that spans the
//! tree lives in `dms-service`. All entities derive `Debug`, `Clone`,
//! `Serialize`, and `Deserialize`.

pub mod access;
pub mod directory;
pub mod file;
pub mod lock;
pub mod node;
pub mod storage;
pub mod taxonomy;

pub use access::{AccessGroup, AccessPolicy, CreateAccessGroup, Permission, PermissionSet};
pub use directory::{Directory, DirectoryCounts};
pub use file::{ContentInfo, File};
pub use lock::{Lock, LockHolder, LockState};
pub use node::NodeInfo;
pub use storage::{CreateStorage, Storage};
pub use taxonomy::{Category, Tag};
