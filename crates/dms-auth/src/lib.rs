//! # dms-auth
//!
//! Access control for the document management core.
//!
//! ## Modules
//!
//! - `access::registry`: access group storage, role membership, and the
//!   effective-user closure
//! - `access::checker`: permission evaluation for one node or, through a
//!   precomputed [`GrantTable`], for many nodes at once

pub mod access;

pub use access::{AccessChecker, AccessGroupRegistry, GrantTable, Principal};
