//! Text processing and chunking functionality for dbot-rs
//!
//! This module provides the chunking strategies and the document loader
//! contract that feeds the index builder.

pub mod chunking;
pub mod loader;

// Re-export main types and functions
pub use chunking::{ChunkMetadata, ChunkingStrategy, TextChunker, split_text};
pub use loader::{Document, DocumentLoader, FileLoader};
