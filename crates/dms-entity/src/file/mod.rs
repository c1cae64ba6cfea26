//! File entities.

pub mod model;

pub use model::{ContentInfo, File};
