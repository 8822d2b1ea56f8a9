//! Document ingestion and chunking

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::IndexError;

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default overlap between consecutive chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 128;

/// Text extracted from one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: PathBuf,
    pub text: String,
}

/// Turns a file into text
///
/// Implement this to plug in formats the crate does not read itself (PDF,
/// office documents, ...).
pub trait FileExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, IndexError>;
}

/// Reads UTF-8 text files as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl FileExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, IndexError> {
        let bytes = std::fs::read(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        String::from_utf8(bytes).map_err(|_| IndexError::Extract {
            path: path.to_path_buf(),
            message: "not valid UTF-8 text".to_string(),
        })
    }
}

/// Recursively loads documents from a directory
///
/// Files are dispatched on their lower-cased extension; anything without a
/// registered extractor goes through [`PlainTextExtractor`]. Hidden files and
/// directories are skipped. Files that fail extraction are skipped with a
/// warning so one bad file does not block the whole index.
pub struct DocumentReader {
    extractors: HashMap<String, Box<dyn FileExtractor>>,
    fallback: PlainTextExtractor,
}

impl Default for DocumentReader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentReader {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
            fallback: PlainTextExtractor,
        }
    }

    /// Register an extractor for an extension (without the dot, e.g. "pdf")
    pub fn with_extractor(mut self, extension: &str, extractor: impl FileExtractor + 'static) -> Self {
        self.extractors
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), Box::new(extractor));
        self
    }

    /// Load every readable document under `dir`, in sorted path order
    pub fn load_data(&self, dir: &Path) -> Result<Vec<Document>, IndexError> {
        if !dir.is_dir() {
            return Err(IndexError::NotADirectory(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();

        let mut documents = Vec::new();
        for path in files {
            match self.extractor_for(&path).extract(&path) {
                Ok(text) if text.trim().is_empty() => {
                    debug!(path = %path.display(), "Skipping empty document");
                }
                Ok(text) => documents.push(Document { source: path, text }),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
            }
        }

        if documents.is_empty() {
            return Err(IndexError::NoDocuments(dir.to_path_buf()));
        }
        Ok(documents)
    }

    fn extractor_for(&self, path: &Path) -> &dyn FileExtractor {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.extractors.get(&e.to_ascii_lowercase()))
            .map(|b| &**b)
            .unwrap_or(&self.fallback)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), IndexError> {
    let io_err = |source| IndexError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);
        if hidden {
            continue;
        }
        // Symlinked directories are not descended into; they can form cycles.
        let is_link = entry.file_type().map_err(io_err)?.is_symlink();
        if path.is_dir() {
            if is_link {
                debug!(path = %path.display(), "Skipping symlinked directory");
                continue;
            }
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Split text into chunks of roughly `chunk_size` characters
///
/// Paragraphs (blank-line separated) are kept together where possible;
/// paragraphs longer than a chunk are cut at character boundaries. Each new
/// chunk starts with the last `overlap` characters of the previous one.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size / 2);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_has_content = false;

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        for piece in hard_wrap(paragraph, chunk_size) {
            let needed = char_len(&current) + 2 + char_len(piece);
            if current_has_content && needed > chunk_size {
                let tail = tail_chars(&current, overlap).to_string();
                chunks.push(std::mem::replace(&mut current, tail));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(piece);
            current_has_content = true;
        }
    }

    if current_has_content {
        chunks.push(current);
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut a paragraph into pieces of at most `size` characters
fn hard_wrap(paragraph: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in paragraph.char_indices() {
        if count == size {
            pieces.push(&paragraph[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < paragraph.len() {
        pieces.push(&paragraph[start..]);
    }
    pieces
}

fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let total = char_len(s);
    if total <= n {
        return s;
    }
    match s.char_indices().nth(total - n) {
        Some((i, _)) => &s[i..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_text_single_chunk() {
        let chunks = split_text("First paragraph.\n\nSecond paragraph.", 1024, 128);
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph.".to_string()]);
    }

    #[test]
    fn test_split_respects_chunk_size_and_overlap() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        let chunks = split_text(text, 10, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "aaaa\n\nbbbb");
        assert_eq!(chunks[1], "bb\n\ncccc");
    }

    #[test]
    fn test_split_long_paragraph_hard_wraps() {
        let text = "é".repeat(25);
        let chunks = split_text(&text, 10, 0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_empty_text() {
        assert!(split_text("  \n\n  ", 100, 10).is_empty());
    }

    #[test]
    fn test_load_data_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.md"), "beta").unwrap();
        std::fs::write(dir.path().join("nested/a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join(".hidden"), "secret").unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let docs = DocumentReader::new().load_data(dir.path()).unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["beta", "alpha"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_load_data_skips_symlinked_directory_cycle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let docs = DocumentReader::new().load_data(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "alpha");
    }

    #[test]
    fn test_load_data_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DocumentReader::new().load_data(dir.path()),
            Err(IndexError::NoDocuments(_))
        ));
    }

    struct UpperExtractor;

    impl FileExtractor for UpperExtractor {
        fn extract(&self, path: &Path) -> Result<String, IndexError> {
            Ok(PlainTextExtractor.extract(path)?.to_uppercase())
        }
    }

    #[test]
    fn test_registered_extractor_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.PDF"), "payload").unwrap();
        let docs = DocumentReader::new()
            .with_extractor(".pdf", UpperExtractor)
            .load_data(dir.path())
            .unwrap();
        assert_eq!(docs[0].text, "PAYLOAD");
    }
}
