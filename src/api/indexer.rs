//! Indexer - builds, saves and reloads semantic indexes
//!
//! Schema indexes live next to their snapshot in `storage.base_dir`, keyed by
//! database name. Document indexes live in `storage.documents_dir`, keyed by
//! the document's file stem.

use crate::api::Retriever;
use crate::config::{ChunkingConfig, Config};
use crate::error::{DbotError, Result};
use crate::ml::{EmbeddingProvider, IndexBuilder, IndexStore, SemanticIndex, create_provider};
use crate::storage::SnapshotStore;
use crate::text::{DocumentLoader, FileLoader};
use crate::utils::file_stem;
use std::path::Path;
use std::sync::Arc;

/// Which artifact directory an index belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Schema,
    Document,
}

/// Entry point for index builds and loads
pub struct Indexer {
    config: Config,
    provider: Arc<dyn EmbeddingProvider>,
    snapshots: SnapshotStore,
    schema_indexes: IndexStore,
    document_indexes: IndexStore,
    show_progress: bool,
}

impl Indexer {
    /// Create an indexer with the provider named in `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let provider = create_provider(&config.embedding)?;
        Ok(Self::with_provider(config, provider))
    }

    /// Create an indexer around an existing provider
    pub fn with_provider(config: Config, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let snapshots = SnapshotStore::new(&config.storage.base_dir);
        let schema_indexes = IndexStore::new(&config.storage.base_dir);
        let document_indexes = IndexStore::new(&config.storage.documents_dir);
        Self {
            config,
            provider,
            snapshots,
            schema_indexes,
            document_indexes,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.provider)
    }

    pub fn store(&self, kind: IndexKind) -> &IndexStore {
        match kind {
            IndexKind::Schema => &self.schema_indexes,
            IndexKind::Document => &self.document_indexes,
        }
    }

    fn builder(&self, chunking: &ChunkingConfig) -> Result<IndexBuilder> {
        Ok(IndexBuilder::new(
            Arc::clone(&self.provider),
            chunking.clone(),
            &self.config.embedding,
            self.config.search.clone(),
        )?
        .with_progress(self.show_progress))
    }

    /// Build the schema index for `db_name` from its stored snapshot
    pub async fn index_snapshot(&self, db_name: &str) -> Result<SemanticIndex> {
        let text = self.snapshots.load(db_name)?;
        let source = self.snapshots.path(db_name)?.display().to_string();

        log::info!("Indexing schema snapshot for {}", db_name);
        let index = self
            .builder(&self.config.schema_chunking)?
            .build(db_name, &text, Some(source))
            .await?;
        self.schema_indexes.save(&index)?;
        log::info!("Schema index for {} holds {} chunks", db_name, index.len());

        self.schema_indexes.load(db_name)
    }

    /// Build a document index; the name defaults to the file stem
    pub async fn index_document(&self, path: &Path, name: Option<&str>) -> Result<SemanticIndex> {
        let name = match name {
            Some(name) => name.to_string(),
            None => file_stem(path).ok_or_else(|| {
                DbotError::Document(format!("Cannot derive an index name from {}", path.display()))
            })?,
        };

        let documents = FileLoader::new()?.load(path)?;
        log::info!("Indexing {} as {}", path.display(), name);
        let index = self
            .builder(&self.config.document_chunking)?
            .build_from_documents(&name, &documents)
            .await?;
        self.document_indexes.save(&index)?;

        self.document_indexes.load(&name)
    }

    /// Index every supported document directly under `dir`
    pub async fn index_directory(&self, dir: &Path) -> Result<Vec<SemanticIndex>> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && crate::utils::is_supported_document(p))
            .collect();
        paths.sort();

        let mut indexes = Vec::with_capacity(paths.len());
        for path in paths {
            indexes.push(self.index_document(&path, None).await?);
        }
        Ok(indexes)
    }

    pub fn exists(&self, kind: IndexKind, name: &str) -> bool {
        self.store(kind).exists(name)
    }

    pub fn load(&self, kind: IndexKind, name: &str) -> Result<SemanticIndex> {
        self.store(kind).load(name)
    }

    /// Load an index and wrap it for querying
    pub fn retriever(&self, kind: IndexKind, name: &str) -> Result<Retriever> {
        Retriever::new(self.load(kind, name)?, self.provider())
    }
}
