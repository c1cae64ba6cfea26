//! # dms-core
//!
//! Core crate for the document management system. Contains the unified
//! error type, typed identifiers, node and content references, the
//! pluggable [`traits::ContentStore`] capability, change events, and the
//! configuration schema.
//!
//! This crate has **no** internal dependencies on other DMS crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
