//! Text chunking algorithms and utilities
//!
//! This module splits documents into bounded chunks for embedding. Sizes are
//! measured in characters, not bytes.
//!
//! Two strategies are available:
//! - [`ChunkingStrategy::Separator`] cuts only on one delimiter and packs whole
//!   units greedily. A unit longer than the chunk size stays intact.
//! - [`ChunkingStrategy::Recursive`] prefers the coarsest boundary that fits and
//!   falls back to finer ones only for oversized spans. Every chunk is an exact
//!   substring of the source.

use crate::config::ChunkingConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Metadata for a text chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Position of the chunk in the source sequence
    pub id: usize,

    /// The actual text content
    pub text: String,

    /// Original document source
    pub source: Option<String>,

    /// Character offset of the first unit in the original document
    pub offset: usize,

    /// Length of the chunk in characters
    pub length: usize,
}

/// Text chunking strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Cut strictly on one delimiter, then pack units up to the chunk size
    Separator { separator: String },

    /// Cut on the first boundary in the list that fits, finer ones as needed.
    /// An empty string means "between characters".
    Recursive { separators: Vec<String> },
}

impl ChunkingStrategy {
    /// Paragraph, line, word, character
    pub fn recursive_default() -> Self {
        ChunkingStrategy::Recursive {
            separators: ["\n\n", "\n", " ", ""].iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A span of the source with its character offset
#[derive(Debug, Clone, Copy)]
struct Piece<'a> {
    offset: usize,
    text: &'a str,
    chars: usize,
}

impl<'a> Piece<'a> {
    fn new(offset: usize, text: &'a str) -> Self {
        Self {
            offset,
            text,
            chars: text.chars().count(),
        }
    }
}

/// Text chunker for processing documents into manageable chunks
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    /// Create a new text chunker with the given configuration
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a chunker with the document defaults
    pub fn with_default_config() -> Self {
        Self {
            config: ChunkingConfig::default(),
        }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Ordered chunk strings
    pub fn split(&self, text: &str) -> Vec<String> {
        self.chunk_text(text, None)
            .into_iter()
            .map(|chunk| chunk.text)
            .collect()
    }

    /// Ordered chunks with offsets and the given source tag
    pub fn chunk_text(&self, text: &str, source: Option<String>) -> Vec<ChunkMetadata> {
        // blank separator units are dropped below; recursive chunks must cover the source
        if text.is_empty() {
            return Vec::new();
        }

        let (pieces, joiner) = match &self.config.strategy {
            ChunkingStrategy::Separator { separator } => {
                (separator_units(text, separator), separator.as_str())
            }
            ChunkingStrategy::Recursive { separators } => (
                recursive_pieces(text, 0, separators, self.config.chunk_size),
                "",
            ),
        };

        let joiner_chars = joiner.chars().count();
        merge(&pieces, joiner_chars, self.config.chunk_size, self.config.overlap)
            .into_iter()
            .enumerate()
            .map(|(id, (start, end))| {
                let text = pieces[start..end]
                    .iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join(joiner);
                let length = text.chars().count();
                ChunkMetadata {
                    id,
                    text,
                    source: source.clone(),
                    offset: pieces[start].offset,
                    length,
                }
            })
            .collect()
    }
}

/// Split and chunk in one call
pub fn split_text(
    document: &str,
    max_size: usize,
    overlap: usize,
    strategy: ChunkingStrategy,
) -> Result<Vec<String>> {
    let chunker = TextChunker::new(ChunkingConfig {
        chunk_size: max_size,
        overlap,
        strategy,
    })?;
    Ok(chunker.split(document))
}

/// Non-blank units between separators
fn separator_units<'a>(text: &'a str, separator: &str) -> Vec<Piece<'a>> {
    let separator_chars = separator.chars().count();
    let mut offset = 0;
    let mut units = Vec::new();
    for unit in text.split(separator) {
        let piece = Piece::new(offset, unit);
        offset += piece.chars + separator_chars;
        if !unit.trim().is_empty() {
            units.push(piece);
        }
    }
    units
}

/// Pieces no longer than `max_size`, each keeping its trailing separator
fn recursive_pieces<'a>(
    text: &'a str,
    base_offset: usize,
    separators: &[String],
    max_size: usize,
) -> Vec<Piece<'a>> {
    let whole = Piece::new(base_offset, text);
    if whole.chars <= max_size {
        return vec![whole];
    }

    let Some(position) = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
    else {
        return hard_cut(text, base_offset, max_size);
    };
    let separator = separators[position].as_str();
    if separator.is_empty() {
        return hard_cut(text, base_offset, max_size);
    }
    let finer = &separators[position + 1..];

    let mut pieces = Vec::new();
    let mut offset = base_offset;
    for part in text.split_inclusive(separator) {
        let piece = Piece::new(offset, part);
        offset += piece.chars;
        if piece.chars <= max_size {
            pieces.push(piece);
        } else if finer.is_empty() {
            pieces.extend(hard_cut(part, piece.offset, max_size));
        } else {
            pieces.extend(recursive_pieces(part, piece.offset, finer, max_size));
        }
    }
    pieces
}

/// Character-level cut into spans of at most `max_size`
fn hard_cut(text: &str, base_offset: usize, max_size: usize) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut start_byte = 0;
    let mut count = 0;
    let mut offset = base_offset;
    for (byte, _) in text.char_indices() {
        if count == max_size {
            pieces.push(Piece {
                offset,
                text: &text[start_byte..byte],
                chars: count,
            });
            offset += count;
            start_byte = byte;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        pieces.push(Piece {
            offset,
            text: &text[start_byte..],
            chars: count,
        });
    }
    pieces
}

/// Greedily pack consecutive pieces into `[start, end)` ranges.
///
/// A new chunk keeps the longest tail of the previous one whose joined length is
/// at most `overlap` and still leaves room for the next piece.
fn merge(pieces: &[Piece<'_>], joiner_chars: usize, max_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let joined = |total: usize, next: usize, empty: bool| {
        if empty { next } else { total + joiner_chars + next }
    };

    let mut ranges = Vec::new();
    let mut start = 0;
    let mut total = 0;

    for (i, piece) in pieces.iter().enumerate() {
        let empty = start == i;
        if !empty && joined(total, piece.chars, false) > max_size {
            ranges.push((start, i));
            while start < i && (total > overlap || joined(total, piece.chars, false) > max_size) {
                total = if start + 1 == i {
                    0
                } else {
                    total - pieces[start].chars - joiner_chars
                };
                start += 1;
            }
        }
        total = joined(total, piece.chars, start == i);
    }

    if start < pieces.len() {
        ranges.push((start, pieces.len()));
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separator(sep: &str) -> ChunkingStrategy {
        ChunkingStrategy::Separator {
            separator: sep.to_string(),
        }
    }

    fn chunker(chunk_size: usize, overlap: usize, strategy: ChunkingStrategy) -> TextChunker {
        TextChunker::new(ChunkingConfig {
            chunk_size,
            overlap,
            strategy,
        })
        .unwrap()
    }

    /// Rebuild a source from offset-tagged chunks, dropping overlapped prefixes
    fn reassemble(chunks: &[ChunkMetadata]) -> String {
        let mut out = String::new();
        let mut end = 0;
        for chunk in chunks {
            assert!(chunk.offset <= end, "gap before chunk {}", chunk.id);
            let skip = end - chunk.offset;
            out.extend(chunk.text.chars().skip(skip));
            end = end.max(chunk.offset + chunk.length);
        }
        out
    }

    #[test]
    fn test_sentence_separator_packing() {
        let chunks = chunker(4, 0, separator(".")).split("A. B. C.");
        assert_eq!(chunks, vec!["A. B", " C"]);
    }

    #[test]
    fn test_separator_round_trip() {
        let text = "CREATE TABLE a (id int);\nCREATE TABLE b (id int);\n\nCREATE VIEW c AS SELECT 1;\n";
        let chunks = chunker(30, 0, separator(";")).split(text);
        let normalized: Vec<&str> = text.split(';').filter(|u| !u.trim().is_empty()).collect();
        assert_eq!(chunks.join(";"), normalized.join(";"));
        assert!(chunks.len() > 1);
    }

    #[test]
    fn test_separator_keeps_oversized_unit_whole() {
        let text = "short;this unit is much longer than the limit;x";
        let chunks = chunker(10, 0, separator(";")).split(text);
        assert_eq!(
            chunks,
            vec!["short", "this unit is much longer than the limit", "x"]
        );
    }

    #[test]
    fn test_separator_offsets() {
        let chunks = chunker(3, 0, separator(";")).chunk_text("ab;cd", Some("s".to_string()));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].offset, 3);
        assert_eq!(chunks[1].text, "cd");
        assert_eq!(chunks[1].source.as_deref(), Some("s"));
    }

    #[test]
    fn test_recursive_round_trip_without_overlap() {
        let text = "First paragraph with several words.\n\nSecond paragraph is here.\nIt has two lines.\n\nThird.";
        let chunks = chunker(30, 0, ChunkingStrategy::recursive_default()).chunk_text(text, None);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
        assert!(chunks.iter().all(|c| c.length <= 30));
    }

    #[test]
    fn test_recursive_round_trip_with_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi rho";
        let chunks = chunker(20, 8, ChunkingStrategy::recursive_default()).chunk_text(text, None);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.length <= 20));
        assert_eq!(reassemble(&chunks), text);

        for pair in chunks.windows(2) {
            let previous_end = pair[0].offset + pair[0].length;
            assert!(previous_end >= pair[1].offset);
            assert!(previous_end - pair[1].offset <= 8);
        }
    }

    #[test]
    fn test_recursive_prefers_paragraphs() {
        let text = "one two three\n\nfour five six";
        let chunks = chunker(16, 0, ChunkingStrategy::recursive_default()).split(text);
        assert_eq!(chunks, vec!["one two three\n\n", "four five six"]);
    }

    #[test]
    fn test_recursive_hard_cut_fallback() {
        let text = "abcdefghij";
        let chunks = chunker(4, 0, ChunkingStrategy::recursive_default()).split(text);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "äöü ßéè";
        let chunks = chunker(4, 0, ChunkingStrategy::recursive_default()).chunk_text(text, None);
        assert_eq!(chunks[0].text, "äöü ");
        assert_eq!(chunks[1].offset, 4);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn test_empty_input() {
        let chunker = TextChunker::with_default_config();
        assert!(chunker.split("").is_empty());
        assert!(self::chunker(10, 0, separator(";")).split("  \n ; ").is_empty());
    }

    #[test]
    fn test_recursive_keeps_whitespace_only_source() {
        let chunks = TextChunker::with_default_config().chunk_text("  \n", None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "  \n");
        assert_eq!(reassemble(&chunks), "  \n");

        let chunks = chunker(2, 0, ChunkingStrategy::recursive_default()).chunk_text("     ", None);
        assert_eq!(reassemble(&chunks), "     ");
        assert!(chunks.iter().all(|c| c.length <= 2));
    }

    #[test]
    fn test_small_text() {
        let chunker = TextChunker::with_default_config();
        let chunks = chunker.chunk_text("Short text", None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text");
        assert_eq!(chunks[0].length, 10);
    }

    #[test]
    fn test_split_text_validates() {
        assert!(split_text("abc", 0, 0, separator(";")).is_err());
        assert_eq!(split_text("a;b", 10, 0, separator(";")).unwrap(), vec!["a;b"]);
    }

    #[test]
    fn test_strategy_serde() {
        let json = serde_json::to_string(&separator(";")).unwrap();
        assert_eq!(json, r#"{"kind":"separator","separator":";"}"#);
        let back: ChunkingStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, separator(";"));
    }
}
