//! Persistence of generated code
//!
//! Each record is written to `<output_dir>/<filename>`, creating the directory
//! on demand and overwriting an existing file of the same name. Filenames come
//! from the model, so they are reduced to a single safe path component first.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::metrics::SAVES;
use crate::output::GeneratedCode;

/// Default output directory, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Error type for saving generated code
#[derive(Debug)]
pub enum PersistError {
    /// Nothing usable is left of the filename after sanitizing
    InvalidFilename(String),
    /// Creating the directory or writing the file failed
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::InvalidFilename(name) => write!(f, "Invalid filename: {:?}", name),
            PersistError::Io { path, source } => write!(f, "Cannot write {}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for PersistError {}

/// Reduce a model-supplied filename to one safe path component
///
/// Keeps the last component (split on `/` and `\`), maps characters outside
/// `[A-Za-z0-9._-]` to `_` and strips leading dots.
pub fn sanitize_filename(raw: &str) -> Result<String, PersistError> {
    let last = raw.trim().rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return Err(PersistError::InvalidFilename(raw.to_string()));
    }
    Ok(cleaned.to_string())
}

/// Writes records into one output directory
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `record` under its own filename
    pub async fn save(&self, record: &GeneratedCode) -> Result<PathBuf, PersistError> {
        self.save_as(record.filename(), record).await
    }

    /// Save the code of `record` as `filename`, overwriting any existing file
    ///
    /// # Returns
    /// The path written to
    pub async fn save_as(&self, filename: &str, record: &GeneratedCode) -> Result<PathBuf, PersistError> {
        let result = self.write(filename, record.code()).await;
        match &result {
            Ok(path) => {
                SAVES.with_label_values(&["success"]).inc();
                info!(path = %path.display(), bytes = record.code().len(), "Saved generated code");
            }
            Err(e) => {
                SAVES.with_label_values(&["error"]).inc();
                warn!(filename, error = %e, "Error saving file");
            }
        }
        result
    }

    async fn write(&self, filename: &str, contents: &str) -> Result<PathBuf, PersistError> {
        let name = sanitize_filename(filename)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| PersistError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, filename: &str) -> GeneratedCode {
        GeneratedCode::new(code, "demo", filename).unwrap()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("demo.py").unwrap(), "demo.py");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("..\\win\\evil.ps1").unwrap(), "evil.ps1");
        assert_eq!(sanitize_filename("my script (1).py").unwrap(), "my_script__1_.py");
        assert_eq!(sanitize_filename(".bashrc").unwrap(), "bashrc");
        assert!(matches!(sanitize_filename("dir/"), Err(PersistError::InvalidFilename(_))));
        assert!(matches!(sanitize_filename(".."), Err(PersistError::InvalidFilename(_))));
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(tmp.path().join("output"));

        let first = store.save(&record("print(1)", "demo.py")).await.unwrap();
        assert_eq!(first, tmp.path().join("output/demo.py"));

        let second = store.save(&record("print(2)", "demo.py")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "print(2)");
        assert_eq!(std::fs::read_dir(tmp.path().join("output")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_traversal_filename_stays_in_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(tmp.path().join("output"));
        let path = store.save(&record("x", "../escape.sh")).await.unwrap();
        assert_eq!(path, tmp.path().join("output/escape.sh"));
        assert!(!tmp.path().join("escape.sh").exists());
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("output");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = OutputStore::new(&blocker);
        assert!(matches!(
            store.save(&record("x", "a.py")).await,
            Err(PersistError::Io { .. })
        ));
    }
}
