//! Semantic index building and persistence
//!
//! A [`SemanticIndex`] is two independently serializable parts:
//! - [`IndexMetadata`], plain data (chunk texts, provider identity, build
//!   settings) written as JSON to `<base>/<name>.meta.json`;
//! - a [`SearchStructure`], written through bincode to `<base>/<name>.idx`.
//!
//! Both carry the same build id. [`IndexStore::load`] reads the two parts
//! separately and reattaches them only when they describe the same build.

use crate::config::ChunkingConfig;
use crate::error::{DbotError, Result};
use crate::ml::embedding::{Embedding, EmbeddingConfig, EmbeddingProvider, ProviderInfo};
use crate::ml::search::{SearchConfig, SearchStructure};
use crate::storage::artifact::{artifact_path, commit, discard, new_build_id, stage};
use crate::text::{ChunkMetadata, Document, TextChunker};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension of the search structure artifact
pub const STRUCTURE_EXTENSION: &str = "idx";

/// Extension of the metadata artifact
pub const METADATA_EXTENSION: &str = "meta.json";

/// Everything about an index except the search structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    pub build_id: String,
    pub created_at: DateTime<Utc>,
    /// Needed to embed future queries the same way
    pub provider: ProviderInfo,
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    /// In embedding order; chunk `i` owns vector `i`
    pub chunks: Vec<ChunkMetadata>,
}

/// A chunk matched by a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: ChunkMetadata,
    pub distance: f32,
}

/// Chunks, their vectors and a search structure over them
#[derive(Debug)]
pub struct SemanticIndex {
    metadata: IndexMetadata,
    structure: SearchStructure,
}

impl SemanticIndex {
    /// Join the two halves, rejecting pairs from different builds
    pub fn attach(metadata: IndexMetadata, structure: SearchStructure) -> Result<Self> {
        if metadata.build_id != structure.build_id() {
            return Err(DbotError::CorruptArtifact(format!(
                "Index {}: metadata belongs to build {}, structure to build {}",
                metadata.name,
                metadata.build_id,
                structure.build_id()
            )));
        }
        if metadata.provider.dimension != structure.dimension() {
            return Err(DbotError::CorruptArtifact(format!(
                "Index {}: metadata dimension {} but structure dimension {}",
                metadata.name,
                metadata.provider.dimension,
                structure.dimension()
            )));
        }
        if metadata.chunks.len() != structure.len() {
            return Err(DbotError::CorruptArtifact(format!(
                "Index {}: {} chunks but {} indexed vectors",
                metadata.name,
                metadata.chunks.len(),
                structure.len()
            )));
        }
        Ok(Self {
            metadata,
            structure,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn build_id(&self) -> &str {
        &self.metadata.build_id
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn structure(&self) -> &SearchStructure {
        &self.structure
    }

    pub fn provider(&self) -> &ProviderInfo {
        &self.metadata.provider
    }

    pub fn chunks(&self) -> &[ChunkMetadata] {
        &self.metadata.chunks
    }

    pub fn chunk(&self, id: usize) -> Option<&ChunkMetadata> {
        self.metadata.chunks.get(id)
    }

    pub fn embedding(&self, id: usize) -> Option<&Embedding> {
        self.structure.vector(id)
    }

    pub fn len(&self) -> usize {
        self.metadata.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.structure.dimension()
    }

    /// Nearest chunks to an already-embedded query
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.structure
            .search(query, k)?
            .into_iter()
            .map(|result| {
                let chunk = self.chunk(result.id).cloned().ok_or_else(|| {
                    DbotError::Search(format!("Search returned unknown chunk {}", result.id))
                })?;
                Ok(ScoredChunk {
                    chunk,
                    distance: result.distance,
                })
            })
            .collect()
    }

    pub fn into_parts(self) -> (IndexMetadata, SearchStructure) {
        (self.metadata, self.structure)
    }
}

/// Chunks text, embeds the chunks and builds the search structure
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
    search: SearchConfig,
    batch_size: usize,
    concurrency: usize,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
        embedding: &EmbeddingConfig,
        search: SearchConfig,
    ) -> Result<Self> {
        embedding.validate()?;
        Ok(Self {
            provider,
            chunker: TextChunker::new(chunking)?,
            search,
            batch_size: embedding.batch_size,
            concurrency: embedding.concurrency,
            show_progress: false,
        })
    }

    /// Draw a progress bar while embedding
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    /// Build from one document
    pub async fn build(&self, name: &str, text: &str, source: Option<String>) -> Result<SemanticIndex> {
        let chunks = self.chunker.chunk_text(text, source);
        self.build_from_chunks(name, chunks).await
    }

    /// Build from several loaded documents, numbering chunks across all of them
    pub async fn build_from_documents(&self, name: &str, documents: &[Document]) -> Result<SemanticIndex> {
        let mut chunks = Vec::new();
        for document in documents {
            let mut new_chunks = self.chunker.chunk_text(&document.text, document.source.clone());
            let start_id = chunks.len();
            for (i, chunk) in new_chunks.iter_mut().enumerate() {
                chunk.id = start_id + i;
            }
            chunks.extend(new_chunks);
        }
        self.build_from_chunks(name, chunks).await
    }

    /// Embed prepared chunks and index them
    pub async fn build_from_chunks(&self, name: &str, chunks: Vec<ChunkMetadata>) -> Result<SemanticIndex> {
        if chunks.is_empty() {
            return Err(DbotError::TextProcessing(format!(
                "Index {} has no text to embed",
                name
            )));
        }

        log::info!("Embedding {} chunks for index {}", chunks.len(), name);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embed_all(&texts).await?;
        let dimension = self.check_dimensions(&embeddings)?;

        let build_id = new_build_id();
        let search = self.search.clone();
        let structure = tokio::task::spawn_blocking(move || {
            SearchStructure::build(&build_id, embeddings, &search)
        })
        .await
        .map_err(|e| DbotError::Search(format!("Index build task failed: {}", e)))??;

        let metadata = IndexMetadata {
            name: name.to_string(),
            build_id: structure.build_id().to_string(),
            created_at: Utc::now(),
            provider: ProviderInfo {
                provider: self.provider.kind(),
                model: self.provider.model_name().to_string(),
                dimension,
            },
            chunking: self.chunker.config().clone(),
            search: self.search.clone(),
            chunks,
        };

        SemanticIndex::attach(metadata, structure)
    }

    /// Batched, order-preserving embedding; any failed batch fails the build
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let progress = if self.show_progress {
            let bar = ProgressBar::new(texts.len() as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} chunks",
            ) {
                bar.set_style(style);
            }
            Some(bar)
        } else {
            None
        };

        let provider = &self.provider;
        let batches: Vec<Vec<Embedding>> = stream::iter(texts.chunks(self.batch_size))
            .map(|batch| async move {
                let embeddings = provider.embed_batch(batch).await?;
                if embeddings.len() != batch.len() {
                    return Err(DbotError::EmbeddingProvider(format!(
                        "Requested {} embeddings, received {}",
                        batch.len(),
                        embeddings.len()
                    )));
                }
                Ok(embeddings)
            })
            .buffered(self.concurrency)
            .inspect_ok(|batch| {
                if let Some(bar) = &progress {
                    bar.inc(batch.len() as u64);
                }
                log::debug!("Embedded batch of {}", batch.len());
            })
            .try_collect()
            .await?;

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }
        Ok(batches.into_iter().flatten().collect())
    }

    fn check_dimensions(&self, embeddings: &[Embedding]) -> Result<usize> {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        if dimension == 0 {
            return Err(DbotError::EmbeddingProvider("Provider returned empty vectors".to_string()));
        }
        if let Some(expected) = self.provider.dimension() {
            if expected != dimension {
                return Err(DbotError::EmbeddingProvider(format!(
                    "Expected dimension {}, received {}",
                    expected, dimension
                )));
            }
        }
        if embeddings.iter().any(|e| e.len() != dimension) {
            return Err(DbotError::EmbeddingProvider(
                "Provider returned vectors of differing dimension".to_string(),
            ));
        }
        Ok(dimension)
    }
}

/// Paths of one index's two artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub structure: PathBuf,
    pub metadata: PathBuf,
}

/// Saves and loads index artifact pairs under one base directory
#[derive(Debug, Clone)]
pub struct IndexStore {
    base_dir: PathBuf,
}

impl IndexStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn paths(&self, name: &str) -> Result<IndexPaths> {
        Ok(IndexPaths {
            structure: artifact_path(&self.base_dir, name, STRUCTURE_EXTENSION)?,
            metadata: artifact_path(&self.base_dir, name, METADATA_EXTENSION)?,
        })
    }

    /// Both artifacts present and describing the same build
    pub fn exists(&self, name: &str) -> bool {
        let Ok(paths) = self.paths(name) else {
            return false;
        };
        if !paths.structure.is_file() || !paths.metadata.is_file() {
            return false;
        }
        let Ok(header) = SearchStructure::read_header(&paths.structure) else {
            return false;
        };
        match Self::read_metadata(&paths.metadata) {
            Ok(metadata) => {
                metadata.build_id == header.build_id
                    && metadata.provider.dimension == header.dimension
                    && metadata.chunks.len() == header.len
            }
            Err(_) => false,
        }
    }

    /// Replace both artifacts; on failure the previous pair is left untouched
    pub fn save(&self, index: &SemanticIndex) -> Result<IndexPaths> {
        self.save_with(index, commit)
    }

    fn save_with<F>(&self, index: &SemanticIndex, commit: F) -> Result<IndexPaths>
    where
        F: Fn(&Path, &Path) -> Result<()>,
    {
        let paths = self.paths(index.name())?;
        let structure_bytes = index.structure().to_bytes()?;
        let metadata_bytes = serde_json::to_vec(index.metadata())?;

        let staged_structure = stage(&paths.structure, &structure_bytes)?;
        let staged_metadata = match stage(&paths.metadata, &metadata_bytes) {
            Ok(staged) => staged,
            Err(e) => {
                discard(&staged_structure);
                return Err(e);
            }
        };

        // the old structure stays restorable until the metadata is in place
        let backup = backup_path(&paths.structure);
        let had_previous = paths.structure.is_file();
        if had_previous {
            if let Err(e) = std::fs::rename(&paths.structure, &backup) {
                discard(&staged_structure);
                discard(&staged_metadata);
                return Err(e.into());
            }
        }

        if let Err(e) = commit(&staged_structure, &paths.structure) {
            discard(&staged_structure);
            discard(&staged_metadata);
            restore_structure(&paths.structure, &backup, had_previous);
            return Err(e);
        }
        if let Err(e) = commit(&staged_metadata, &paths.metadata) {
            discard(&staged_metadata);
            restore_structure(&paths.structure, &backup, had_previous);
            return Err(e);
        }
        discard(&backup);

        log::info!(
            "Saved index {} ({} chunks) to {} and {}",
            index.name(),
            index.len(),
            paths.structure.display(),
            paths.metadata.display()
        );
        Ok(paths)
    }

    /// Read both artifacts and reattach them
    pub fn load(&self, name: &str) -> Result<SemanticIndex> {
        let paths = self.paths(name)?;
        for path in [&paths.metadata, &paths.structure] {
            if !path.is_file() {
                return Err(DbotError::NotFound(format!(
                    "index artifact {}; build the index first",
                    path.display()
                )));
            }
        }

        let metadata = Self::read_metadata(&paths.metadata)?;
        let bytes = std::fs::read(&paths.structure)?;
        let structure = SearchStructure::from_bytes(&bytes)?;

        let index = SemanticIndex::attach(metadata, structure)?;
        log::info!("Loaded index {} with {} chunks", name, index.len());
        Ok(index)
    }

    fn read_metadata(path: &Path) -> Result<IndexMetadata> {
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data)
            .map_err(|e| DbotError::CorruptArtifact(format!("Unreadable index metadata {}: {}", path.display(), e)))
    }
}

/// Where the previous structure waits while a new pair is committed
fn backup_path(structure: &Path) -> PathBuf {
    let mut name = structure.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Put the previous structure back, or drop the new one when there was none
fn restore_structure(structure: &Path, backup: &Path, had_previous: bool) {
    let restored = if had_previous {
        std::fs::rename(backup, structure)
    } else if structure.exists() {
        std::fs::remove_file(structure)
    } else {
        Ok(())
    };
    if let Err(e) = restored {
        log::warn!("Failed to restore index structure {}: {}", structure.display(), e);
    }
}
