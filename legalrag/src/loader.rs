//! Document sources, data-quality checks and chunk export.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_SOURCE: &str = "unknown";
const DUPLICATE_PREFIX_CHARS: usize = 100;
/// Minimum content length, in characters, used by [`DataValidator::validate_all`].
pub const DEFAULT_MIN_LENGTH: usize = 100;

/// A document record as found on disk, with every field optional.
#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    id: Option<Value>,
    title: Option<String>,
    content: Option<String>,
    source: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

impl RawDocument {
    fn into_document(self, position: usize) -> Document {
        let id = match self.id {
            Some(Value::String(id)) => id,
            Some(Value::Null) | None => position.to_string(),
            Some(other) => other.to_string(),
        };
        Document {
            id,
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            content: self.content.unwrap_or_default(),
            source: self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            metadata: self.metadata,
        }
    }
}

/// Loads [`Document`]s from JSON files.
///
/// Missing fields take defaults: the id becomes the record's position, the
/// title `"Untitled"`, the content empty, and the source `"unknown"`.
///
/// # Example
///
/// ```rust,ignore
/// use legalrag::loader::DocumentLoader;
///
/// let documents = DocumentLoader::load("data/raw/sample_legal_docs.json")?;
/// ```
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load by extension: `.jsonl` as JSON Lines, anything else as a JSON array.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Document>> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") => Self::load_from_jsonl(path),
            _ => Self::load_from_json(path),
        }
    }

    /// Load a JSON array of document records.
    ///
    /// # Errors
    ///
    /// [`RagError::Io`] if the file cannot be read, [`RagError::LoaderError`]
    /// if it is not a JSON array of objects.
    pub fn load_from_json(path: impl AsRef<Path>) -> Result<Vec<Document>> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading documents");
        let text = fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        let records: Vec<RawDocument> = serde_json::from_str(&text).map_err(|e| {
            RagError::LoaderError { path: path.to_path_buf(), message: e.to_string() }
        })?;

        let documents: Vec<Document> =
            records.into_iter().enumerate().map(|(i, raw)| raw.into_document(i)).collect();
        info!(count = documents.len(), "documents loaded");
        Ok(documents)
    }

    /// Load one document record per line. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// [`RagError::LoaderError`] names the first line that fails to parse.
    pub fn load_from_jsonl(path: impl AsRef<Path>) -> Result<Vec<Document>> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading documents");
        let file = File::open(path).map_err(|e| RagError::io(path, e))?;

        let mut documents = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| RagError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let raw: RawDocument = serde_json::from_str(&line).map_err(|e| RagError::LoaderError {
                path: path.to_path_buf(),
                message: format!("line {}: {e}", line_no + 1),
            })?;
            let position = documents.len();
            documents.push(raw.into_document(position));
        }
        info!(count = documents.len(), "documents loaded");
        Ok(documents)
    }
}

/// Write chunks as JSON Lines, creating parent directories as needed.
pub fn save_chunks_jsonl(chunks: &[Chunk], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| RagError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for chunk in chunks {
        serde_json::to_writer(&mut writer, chunk).map_err(|e| RagError::LoaderError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        writer.write_all(b"\n").map_err(|e| RagError::io(path, e))?;
    }
    writer.flush().map_err(|e| RagError::io(path, e))?;
    info!(path = %path.display(), chunk_count = chunks.len(), "chunks saved");
    Ok(())
}

/// Outcome of one data-quality check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCheck {
    /// Check name.
    pub check: String,
    /// Whether no document was flagged.
    pub passed: bool,
    /// Number of flagged documents.
    pub count: usize,
    /// Human-readable summary.
    pub details: String,
}

/// Data-quality checks run before indexing. None of them is fatal.
pub struct DataValidator;

impl DataValidator {
    /// Flag documents whose content is empty or whitespace.
    pub fn check_empty_content(documents: &[Document]) -> ValidationCheck {
        let count = documents.iter().filter(|d| d.content.trim().is_empty()).count();
        ValidationCheck {
            check: "empty_content".to_string(),
            passed: count == 0,
            count,
            details: format!("{count}/{} documents have empty content", documents.len()),
        }
    }

    /// Flag documents whose first 100 characters repeat an earlier document's.
    pub fn check_duplicates(documents: &[Document]) -> ValidationCheck {
        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = documents
            .iter()
            .filter(|d| {
                let prefix: String = d.content.chars().take(DUPLICATE_PREFIX_CHARS).collect();
                !seen.insert(prefix)
            })
            .map(|d| d.id.as_str())
            .collect();
        if !duplicates.is_empty() {
            warn!(ids = ?duplicates, "potential duplicate documents");
        }
        ValidationCheck {
            check: "duplicates".to_string(),
            passed: duplicates.is_empty(),
            count: duplicates.len(),
            details: format!("Found {} potential duplicates", duplicates.len()),
        }
    }

    /// Flag documents with fewer than `min_length` characters of content.
    pub fn check_min_length(documents: &[Document], min_length: usize) -> ValidationCheck {
        let count = documents.iter().filter(|d| d.content.chars().count() < min_length).count();
        ValidationCheck {
            check: "min_length".to_string(),
            passed: count == 0,
            count,
            details: format!("{count}/{} documents shorter than {min_length} chars", documents.len()),
        }
    }

    /// Run every check with default thresholds.
    pub fn validate_all(documents: &[Document]) -> Vec<ValidationCheck> {
        vec![
            Self::check_empty_content(documents),
            Self::check_duplicates(documents),
            Self::check_min_length(documents, DEFAULT_MIN_LENGTH),
        ]
    }
}
