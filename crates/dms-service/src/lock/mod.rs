//! Exclusive node locks, grouped by operation.

pub mod manager;
pub mod operation;
pub mod service;

pub use manager::LockManager;
pub use operation::Operation;
pub use service::LockService;
