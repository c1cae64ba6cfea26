//! Change events emitted after every mutation.
//!
//! Events are fire-and-forget: the host subscribes to drive UI refresh
//! and activity logs, and a failed delivery never rolls back data.

pub mod change;

pub use change::{ChangeEvent, ChangeKind};
