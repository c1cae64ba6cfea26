//! Access-control entities.

pub mod group;
pub mod permission;
pub mod policy;

pub use group::{AccessGroup, CreateAccessGroup};
pub use permission::{Permission, PermissionSet};
pub use policy::AccessPolicy;
