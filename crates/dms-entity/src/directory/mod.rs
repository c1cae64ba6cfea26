//! Directory entities.

pub mod model;

pub use model::{Directory, DirectoryCounts};
