//! Node repository: the single owner of every storage, directory, file,
//! tag, and category record.

pub mod store;
pub mod tree;

pub use store::NodeRepository;
pub use tree::{Placement, RemovedSubtree, TreeState};
