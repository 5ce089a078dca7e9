//! Upload storage
//!
//! Accepts one raw activity file and stores it under the upload directory as
//! `<epoch_millis>-<field><ext>`, returning a receipt whose `file_path` is the
//! reference handed to the analysis stage.

use crate::error::ComputeError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Form field name used for activity files
pub const DEFAULT_UPLOAD_FIELD: &str = "fitFile";

/// Message returned with every successful upload
pub const UPLOAD_ACCEPTED_MESSAGE: &str = "File received and stored.";

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    pub file_path: PathBuf,
    pub original_name: String,
}

/// Directory-backed store for uploaded files
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store one uploaded file.
    ///
    /// The directory is created on demand. Fails with `EmptyUpload` when no
    /// bytes were sent.
    pub fn store(
        &self,
        field: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, ComputeError> {
        if bytes.is_empty() {
            return Err(ComputeError::EmptyUpload(format!(
                "no file content received for field '{field}'"
            )));
        }

        fs::create_dir_all(&self.dir)?;

        let stem = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            sanitize(field, DEFAULT_UPLOAD_FIELD)
        );
        let ext = extension_of(original_name);

        let mut attempt = 0u32;
        let (file_path, mut file) = loop {
            let name = if attempt == 0 {
                format!("{stem}{ext}")
            } else {
                format!("{stem}-{attempt}{ext}")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        };

        file.write_all(bytes)?;
        file.flush()?;

        tracing::info!(path = %file_path.display(), bytes = bytes.len(), "stored upload");

        Ok(UploadReceipt {
            message: UPLOAD_ACCEPTED_MESSAGE.to_string(),
            file_path,
            original_name: original_name.to_string(),
        })
    }

    /// Read and store a file from disk
    pub fn store_file(&self, field: &str, source: &Path) -> Result<UploadReceipt, ComputeError> {
        let bytes = fs::read(source)?;
        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.store(field, &original_name, &bytes)
    }
}

/// Extension of the original file name including the dot, or empty
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .map(|ext| sanitize(&ext.to_string_lossy(), ""))
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

fn sanitize(value: &str, fallback: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> UploadStore {
        let dir = std::env::temp_dir().join(format!("lapflux-{name}-{}", uuid::Uuid::new_v4()));
        UploadStore::new(dir)
    }

    #[test]
    fn test_store_upload() {
        let store = temp_store("store");
        let receipt = store
            .store(DEFAULT_UPLOAD_FIELD, "morning run.FIT", b"\x0e\x10fit")
            .unwrap();

        assert_eq!(receipt.message, UPLOAD_ACCEPTED_MESSAGE);
        assert_eq!(receipt.original_name, "morning run.FIT");
        let name = receipt.file_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-fitFile.FIT"), "{name}");
        assert!(name.split('-').next().unwrap().parse::<i64>().is_ok());
        assert_eq!(fs::read(&receipt.file_path).unwrap(), b"\x0e\x10fit");

        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_empty_upload_rejected() {
        let store = temp_store("empty");
        assert!(matches!(
            store.store(DEFAULT_UPLOAD_FIELD, "a.fit", b""),
            Err(ComputeError::EmptyUpload(_))
        ));
        assert!(!store.dir().exists());
    }

    #[test]
    fn test_same_millisecond_uploads_do_not_collide() {
        let store = temp_store("collide");
        let a = store.store("fitFile", "a.fit", b"a").unwrap();
        let b = store.store("fitFile", "b.fit", b"b").unwrap();

        assert_ne!(a.file_path, b.file_path);
        assert_eq!(fs::read(&a.file_path).unwrap(), b"a");
        assert_eq!(fs::read(&b.file_path).unwrap(), b"b");

        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_file_names_are_sanitized() {
        assert_eq!(extension_of("../../etc/passwd"), "");
        assert_eq!(extension_of("run.f/it"), "");
        assert_eq!(extension_of("run.csv"), ".csv");
        assert_eq!(sanitize("../x", "fitFile"), "x");
        assert_eq!(sanitize("//", "fitFile"), "fitFile");
    }
}
