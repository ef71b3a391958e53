//! Corpus loading.

use std::path::Path;

use rag_types::Document;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::IndexingError;

/// File extensions picked up when the corpus is a directory.
const CORPUS_EXTENSIONS: &[&str] = &["txt", "md"];

/// Read a corpus: a single file, or every `.txt`/`.md` file under a
/// directory in sorted path order.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>, IndexingError> {
    if !path.exists() {
        return Err(IndexingError::Corpus {
            path: path.to_path_buf(),
            message: "not found; set `corpus_path` or pass --corpus".to_string(),
        });
    }

    if path.is_file() {
        return Ok(vec![read_document(path)?]);
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| IndexingError::Corpus {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let is_corpus_file = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| CORPUS_EXTENSIONS.contains(&ext));
        if is_corpus_file {
            documents.push(read_document(entry.path())?);
        }
    }

    info!(path = ?path, documents = documents.len(), "Loaded corpus");
    Ok(documents)
}

fn read_document(path: &Path) -> Result<Document, IndexingError> {
    let text = std::fs::read_to_string(path).map_err(|e| IndexingError::Corpus {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    debug!(path = ?path, bytes = text.len(), "Read document");
    Ok(Document::new(path.display().to_string(), text))
}
