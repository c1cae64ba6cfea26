//! Access groups and permission evaluation.

pub mod checker;
pub mod registry;

pub use checker::{AccessChecker, GrantTable, Principal};
pub use registry::AccessGroupRegistry;
