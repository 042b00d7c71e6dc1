//! Document loading
//!
//! A loader only has to yield non-empty text units tagged with where they came
//! from. PDF text is extracted with `pdf-extract`; everything else supported is
//! read as UTF-8.

use crate::error::{DbotError, Result};
use crate::utils::{get_file_extension, is_supported_document};
use regex::Regex;
use std::path::Path;

/// One unit of source text
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub source: Option<String>,
}

impl Document {
    pub fn new(text: impl Into<String>, source: Option<String>) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// Anything that can turn a path into text units
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>>;
}

/// Loads `.pdf`, `.txt`, `.md`, `.markdown` and `.sql` files
#[derive(Debug)]
pub struct FileLoader {
    trailing_space: Regex,
    blank_runs: Regex,
}

impl FileLoader {
    pub fn new() -> Result<Self> {
        let trailing_space = Regex::new(r"[ \t]+\n")
            .map_err(|e| DbotError::TextProcessing(format!("Failed to compile whitespace regex: {}", e)))?;
        let blank_runs = Regex::new(r"\n{3,}")
            .map_err(|e| DbotError::TextProcessing(format!("Failed to compile newline regex: {}", e)))?;
        Ok(Self {
            trailing_space,
            blank_runs,
        })
    }

    /// Drop trailing spaces and collapse runs of blank lines into one
    pub fn normalize(&self, text: &str) -> String {
        let text = text.replace("\r\n", "\n");
        let text = self.trailing_space.replace_all(&text, "\n");
        self.blank_runs.replace_all(&text, "\n\n").trim().to_string()
    }

    fn extract_pdf(path: &Path) -> Result<String> {
        pdf_extract::extract_text(path)
            .map_err(|e| DbotError::Document(format!("Failed to extract text from {}: {}", path.display(), e)))
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        if !path.is_file() {
            return Err(DbotError::NotFound(format!("document {}", path.display())));
        }
        if !is_supported_document(path) {
            return Err(DbotError::Document(format!(
                "Unsupported document type: {}",
                path.display()
            )));
        }

        let raw = match get_file_extension(path).as_deref() {
            Some("pdf") => Self::extract_pdf(path)?,
            _ => std::fs::read_to_string(path)?,
        };

        let text = self.normalize(&raw);
        if text.is_empty() {
            return Err(DbotError::Document(format!(
                "No text could be extracted from {}",
                path.display()
            )));
        }

        log::info!("Loaded {} characters from {}", text.chars().count(), path.display());
        Ok(vec![Document::new(text, Some(path.to_string_lossy().to_string()))])
    }
}
