//! Tags and categories attached to nodes.

pub mod category;
pub mod tag;

pub use category::Category;
pub use tag::Tag;
