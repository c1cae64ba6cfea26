//! Core type definitions used across the DMS workspace.

pub mod content;
pub mod id;
pub mod node;

pub use content::{ContentRef, SaveType};
pub use id::*;
pub use node::{NodeKind, NodeRef};
