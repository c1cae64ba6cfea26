//! # dms-storage
//!
//! Content store implementations for the DMS. Supports an embedded
//! database blob table and the local filesystem, routed by
//! [`SaveType`](dms_core::types::SaveType) through the
//! [`ContentStoreRegistry`]. Also derives checksum, size, and mimetype
//! from content and enforces the upload policy.

pub mod digest;
pub mod mime;
pub mod policy;
pub mod providers;
pub mod registry;

pub use digest::ContentDigest;
pub use policy::ContentPolicy;
pub use registry::ContentStoreRegistry;
