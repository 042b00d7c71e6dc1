//! Artifact paths and atomic writes
//!
//! Every persisted artifact lives at `<base>/<sanitized name>.<extension>`.
//! Existence checks, saves and loads all go through [`artifact_path`] so they
//! agree on the same derivation.

use crate::error::{DbotError, Result};
use crate::utils::{ensure_directory, sanitize_filename};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix appended to staged files before they are renamed into place
pub const TEMP_SUFFIX: &str = "tmp";

/// Deterministic path for a named artifact
pub fn artifact_path(base_dir: &Path, name: &str, extension: &str) -> Result<PathBuf> {
    let sanitized = sanitize_filename(name);
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        return Err(DbotError::Config(format!("Invalid artifact name: {:?}", name)));
    }
    Ok(base_dir.join(format!("{}.{}", sanitized, extension)))
}

/// Sibling path used while an artifact is being written
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Write bytes to the staging path for `path` and return it
pub fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    let staged = temp_path(path);
    let mut file = std::fs::File::create(&staged)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(staged)
}

/// Move a staged file over its final path
pub fn commit(staged: &Path, path: &Path) -> Result<()> {
    std::fs::rename(staged, path)?;
    Ok(())
}

/// Stage and commit in one step
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let staged = stage(path, bytes)?;
    if let Err(e) = commit(&staged, path) {
        discard(&staged);
        return Err(e);
    }
    Ok(())
}

/// Best-effort removal of a staged file
pub fn discard(staged: &Path) {
    if staged.exists() {
        if let Err(e) = std::fs::remove_file(staged) {
            log::warn!("Failed to remove staged file {}: {}", staged.display(), e);
        }
    }
}

/// Identifier shared by both artifacts of one index build
pub fn new_build_id() -> String {
    let now = chrono::Utc::now();
    format!(
        "{}-{:09}-{}",
        now.format("%Y%m%dT%H%M%S"),
        now.timestamp_subsec_nanos(),
        std::process::id()
    )
}
