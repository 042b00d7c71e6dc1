//! Storage functionality for dbot-rs
//!
//! Flat-file artifacts under a configured base directory: schema snapshots
//! here, index artifact pairs in [`crate::ml::index::IndexStore`].

pub mod artifact;
pub mod snapshot;

// Re-export main types
pub use artifact::artifact_path;
pub use snapshot::SnapshotStore;
