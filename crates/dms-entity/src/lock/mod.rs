//! Lock entities.

pub mod model;

pub use model::{Lock, LockHolder, LockState};
