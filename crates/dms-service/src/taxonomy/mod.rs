//! Tags, categories, and per-node metadata.

pub mod service;

pub use service::{MetadataUpdate, TaxonomyService};
