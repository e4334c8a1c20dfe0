//! TreeDrive Storage -- metadata document and stored file content.
//!
//! Metadata is one JSON array rewritten wholesale on every mutation.
//! Content is one file per stored filename under the uploads directory.
//! Callers are single-threaded; nothing here locks.

pub mod content;
pub mod metadata;

pub use content::{ChunkRead, ContentStore};
pub use metadata::{MetadataEntry, MetadataStore};

use std::path::{Component, Path};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid filename: {0}")]
    InvalidFilename(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Validate a client-supplied filename.
///
/// A stored filename is exactly one normal path component: no separators,
/// no `.`/`..`, no NUL, not empty.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(StorageError::InvalidFilename("empty filename".into()));
    }
    if filename.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidFilename(format!(
            "path separators not allowed: {filename}"
        )));
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StorageError::InvalidFilename(format!(
            "not a plain file name: {filename}"
        ))),
    }
}
