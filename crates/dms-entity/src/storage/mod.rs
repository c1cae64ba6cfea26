//! Storage policy entities.

pub mod model;

pub use model::{CreateStorage, Storage};
