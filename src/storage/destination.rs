//! The opaque destination handle for committed output.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use crate::error_handling::types::StorageError;

/// Where the committed database ultimately resides.
///
/// The session engine touches the destination exactly once, from the
/// committer, after all workers have stopped. The handle stays opaque until
/// then: the engine only needs a byte sink.
pub trait Destination: Send + Sync {
    /// Opens the destination for a full overwrite.
    fn open_for_write(&self) -> Result<Box<dyn Write + Send>, StorageError>;

    /// Human-readable description, for logs and events.
    fn describe(&self) -> String;
}

/// Destination backed by a regular file, as used by the CLI.
pub struct FileDestination {
    path: PathBuf,
}

impl FileDestination {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Destination for FileDestination {
    fn open_for_write(&self) -> Result<Box<dyn Write + Send>, StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
            }
        }
        let file =
            File::create(&self.path).map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        info!("Opened destination file {}", self.path.display());
        Ok(Box::new(file))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_destination_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/output/capture.db");
        let destination = FileDestination::new(&path);

        let mut sink = destination.open_for_write().unwrap();
        sink.write_all(b"payload").unwrap();
        drop(sink);

        assert_eq!(fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn test_file_destination_truncates_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.db");
        fs::write(&path, b"old longer content").unwrap();

        let destination = FileDestination::new(&path);
        let mut sink = destination.open_for_write().unwrap();
        sink.write_all(b"new").unwrap();
        drop(sink);

        assert_eq!(fs::read(&path).unwrap(), b"new");
    }
}
