//! API layer for dbot-rs
//!
//! This module provides the main public entry points: snapshot generation,
//! index building and retrieval over built indexes.

pub mod generator;
pub mod indexer;
pub mod retriever;

// Re-export main API types
pub use generator::SnapshotGenerator;
pub use indexer::{IndexKind, Indexer};
pub use retriever::Retriever;
