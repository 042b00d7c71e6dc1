//! Retriever - query embedding and top-k lookup over a loaded index
//!
//! This is the handoff point to whatever answers questions: it returns the
//! chunks most similar to a question, or those chunks joined as context.

use crate::error::{DbotError, Result};
use crate::ml::{Embedding, EmbeddingProvider, ScoredChunk, SemanticIndex};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Query embeddings remembered per retriever
pub const QUERY_CACHE_SIZE: usize = 128;

/// Searches one loaded index with the provider that built it
pub struct Retriever {
    index: SemanticIndex,
    provider: Arc<dyn EmbeddingProvider>,
    cache: LruCache<String, Embedding>,
}

impl Retriever {
    /// Fails when `provider` is not the one recorded in the index
    pub fn new(index: SemanticIndex, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let recorded = index.provider();
        if recorded.provider != provider.kind() || recorded.model != provider.model_name() {
            return Err(DbotError::Config(format!(
                "Index {} was built with {:?}/{}, but the configured provider is {:?}/{}",
                index.name(),
                recorded.provider,
                recorded.model,
                provider.kind(),
                provider.model_name()
            )));
        }
        if let Some(dimension) = provider.dimension() {
            if dimension != index.dimension() {
                return Err(DbotError::Config(format!(
                    "Index {} has dimension {}, provider produces {}",
                    index.name(),
                    index.dimension(),
                    dimension
                )));
            }
        }

        let capacity = NonZeroUsize::new(QUERY_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            index,
            provider,
            cache: LruCache::new(capacity),
        })
    }

    pub fn index(&self) -> &SemanticIndex {
        &self.index
    }

    /// Number of cached query embeddings
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    async fn embed_query(&mut self, query: &str) -> Result<Embedding> {
        if let Some(cached) = self.cache.get(query) {
            return Ok(cached.clone());
        }
        let embedding = self.provider.embed(query).await?;
        self.cache.put(query.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// The `top_k` chunks closest to `query`, nearest first
    pub async fn search(&mut self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        log::info!("Searching {} for: '{}' (top {})", self.index.name(), query, top_k);
        let embedding = self.embed_query(query).await?;
        let results = self.index.search(&embedding, top_k)?;
        log::debug!("Found {} results", results.len());
        Ok(results)
    }

    /// Matched chunk texts joined by blank lines
    pub async fn context(&mut self, query: &str, top_k: usize) -> Result<String> {
        let results = self.search(query, top_k).await?;
        Ok(results
            .iter()
            .map(|r| r.chunk.text.trim())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
