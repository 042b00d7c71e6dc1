//! Configuration for dbot-rs
//!
//! All sections have defaults matching the assistant's original behaviour, so
//! `Config::default()` is usable as-is. A JSON file may override any subset of
//! fields.

use crate::catalog::ConstraintOrder;
use crate::error::{DbotError, Result};
use crate::ml::embedding::EmbeddingConfig;
use crate::ml::search::SearchConfig;
use crate::text::ChunkingStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `storage.base_dir`
pub const DATA_DIR_ENV: &str = "DBOT_DATA_DIR";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    /// Chunking applied to schema snapshots
    pub schema_chunking: ChunkingConfig,
    /// Chunking applied to free-form documents
    pub document_chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            catalog: CatalogConfig::default(),
            schema_chunking: ChunkingConfig::schema(),
            document_chunking: ChunkingConfig::document(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// Where artifacts live on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding snapshot and index artifacts
    pub base_dir: PathBuf,
    /// Directory scanned for source documents
    pub documents_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("data/db"),
            documents_dir: PathBuf::from("data/pdf"),
        }
    }
}

/// Namespace filtering and rendering options for catalog snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Namespaces starting with any of these prefixes are system-reserved
    pub excluded_prefixes: Vec<String>,
    /// Namespaces with exactly these names are skipped
    pub excluded_names: Vec<String>,
    /// Apply the exclusion set when generating a snapshot
    pub exclude_reserved: bool,
    /// Order of constraint annotations on a single column
    pub constraint_order: ConstraintOrder,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: vec!["pg_".to_string()],
            excluded_names: vec!["public".to_string(), "information_schema".to_string()],
            exclude_reserved: true,
            constraint_order: ConstraintOrder::default(),
        }
    }
}

impl CatalogConfig {
    /// Whether a namespace belongs to the configured exclusion set
    pub fn is_excluded(&self, namespace: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| namespace.starts_with(prefix.as_str()))
            || self.excluded_names.iter().any(|name| name == namespace)
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks
    pub overlap: usize,
    /// How boundaries are chosen
    pub strategy: ChunkingStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::document()
    }
}

impl ChunkingConfig {
    /// Statement-level packing used for schema snapshots
    pub fn schema() -> Self {
        Self {
            chunk_size: 1500,
            overlap: 0,
            strategy: ChunkingStrategy::Separator {
                separator: ";".to_string(),
            },
        }
    }

    /// Boundary-preferring split used for documents
    pub fn document() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            strategy: ChunkingStrategy::recursive_default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DbotError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(DbotError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        match &self.strategy {
            ChunkingStrategy::Separator { separator } if separator.is_empty() => Err(
                DbotError::Config("separator strategy needs a non-empty separator".to_string()),
            ),
            ChunkingStrategy::Recursive { separators } if separators.is_empty() => Err(
                DbotError::Config("recursive strategy needs at least one separator".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            DbotError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let mut config: Config = serde_json::from_str(&data)?;
        config.apply_env();
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.storage.base_dir = PathBuf::from(dir);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.schema_chunking.validate()?;
        self.document_chunking.validate()?;
        self.embedding.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.base_dir, PathBuf::from("data/db"));
        assert_eq!(config.schema_chunking.chunk_size, 1500);
    }

    #[test]
    fn test_namespace_exclusion() {
        let catalog = CatalogConfig::default();
        assert!(catalog.is_excluded("pg_catalog"));
        assert!(catalog.is_excluded("pg_toast"));
        assert!(catalog.is_excluded("public"));
        assert!(catalog.is_excluded("information_schema"));
        assert!(!catalog.is_excluded("sales"));
        assert!(!catalog.is_excluded("public_api"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let config = ChunkingConfig {
            chunk_size: 10,
            overlap: 10,
            strategy: ChunkingStrategy::recursive_default(),
        };
        assert!(matches!(config.validate(), Err(DbotError::Config(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "storage": { "base_dir": "/tmp/dbot" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.storage.base_dir, PathBuf::from("/tmp/dbot"));
        assert_eq!(config.storage.documents_dir, PathBuf::from("data/pdf"));
        assert_eq!(config.catalog.excluded_names.len(), 2);
    }
}
