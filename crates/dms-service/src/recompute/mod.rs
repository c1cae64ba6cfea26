//! Derived-field recomputation and propagation through the tree.

pub mod engine;
pub mod field;

pub use engine::RecomputeEngine;
pub use field::{ChangeSet, DerivedField, FieldSet};
