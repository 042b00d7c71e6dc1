//! Schema snapshot persistence

use crate::error::{DbotError, Result};
use crate::storage::artifact::{artifact_path, write_atomic};
use std::path::{Path, PathBuf};

/// Extension of snapshot artifacts
pub const SNAPSHOT_EXTENSION: &str = "sql";

/// Stores one flat text snapshot per database name
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the snapshot for `db_name`
    pub fn path(&self, db_name: &str) -> Result<PathBuf> {
        artifact_path(&self.base_dir, db_name, SNAPSHOT_EXTENSION)
    }

    pub fn exists(&self, db_name: &str) -> bool {
        self.path(db_name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Overwrite the snapshot; last writer wins
    pub fn save(&self, db_name: &str, text: &str) -> Result<PathBuf> {
        let path = self.path(db_name)?;
        write_atomic(&path, text.as_bytes())?;
        log::info!("Saved schema snapshot for {} to {}", db_name, path.display());
        Ok(path)
    }

    pub fn load(&self, db_name: &str) -> Result<String> {
        let path = self.path(db_name)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DbotError::NotFound(format!(
                "schema snapshot for {} ({}); generate it first",
                db_name,
                path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
