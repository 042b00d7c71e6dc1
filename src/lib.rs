//! # dbot-rs
//!
//! Schema snapshots and semantic indexes for a database question-answering
//! assistant. The catalog of a PostgreSQL database is rendered into a
//! deterministic DDL-like snapshot, split into chunks, embedded and stored as a
//! searchable index that a question-answering layer can query for context.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dbot_rs::{Config, IndexKind, Indexer, SnapshotGenerator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!
//!     // Render the catalog and save data/db/shop.sql
//!     SnapshotGenerator::new(&config)
//!         .generate("shop", "postgres://localhost/shop")
//!         .await?;
//!
//!     // Chunk, embed and persist the schema index
//!     let indexer = Indexer::new(config)?;
//!     indexer.index_snapshot("shop").await?;
//!
//!     // Query it
//!     let mut retriever = indexer.retriever(IndexKind::Schema, "shop")?;
//!     for result in retriever.search("which table stores orders?", 4).await? {
//!         println!("{:.3} {}", result.distance, result.chunk.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ml;
pub mod storage;
pub mod text;
pub mod utils;

// Re-export main API types
pub use api::{IndexKind, Indexer, Retriever, SnapshotGenerator};
pub use catalog::{CatalogSource, NamespaceCatalog, PgCatalogReader, SchemaAssembler};
pub use config::Config;
pub use error::{DbotError, Result};

// Re-export commonly used types
pub use ml::{IndexStore, ScoredChunk, SemanticIndex};
pub use storage::SnapshotStore;
pub use text::{ChunkMetadata, TextChunker};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_imports() {
        // Ensure all major types can be imported
        let config = Config::default();
        assert!(config.validate().is_ok());
        let _assembler = SchemaAssembler::new(config.catalog.clone());
    }
}
