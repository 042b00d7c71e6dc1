//! Embeddings, vector search and the semantic index
//!
//! Text chunks are embedded by an [`EmbeddingProvider`], indexed by a
//! [`SearchStructure`] and persisted as an artifact pair by [`IndexStore`].

pub mod embedding;
pub mod index;
pub mod search;

// Re-export main types and functions
pub use embedding::{
    Embedding, EmbeddingConfig, EmbeddingProvider, HashEmbedding, OllamaEmbedding, OpenAiEmbedding,
    ProviderInfo, ProviderKind, create_provider,
};
pub use index::{IndexBuilder, IndexMetadata, IndexPaths, IndexStore, ScoredChunk, SemanticIndex};
pub use search::{DistanceMetric, SearchConfig, SearchResult, SearchStructure, StructureHeader};
