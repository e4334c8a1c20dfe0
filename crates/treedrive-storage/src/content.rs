//! Stored file content, one file per filename under a root directory.
//!
//! Chunk reads are stateless: every call reopens the file and seeks to
//! `chunk_number * chunk_size`.

use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::{validate_filename, Result};

/// Result of one positioned read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRead {
    pub data: Vec<u8>,
    /// Fewer than `chunk_size` bytes were available, including zero.
    pub end_of_file: bool,
}

pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open (or create) the uploads directory at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        Ok(self.root.join(filename))
    }

    /// Replace the stored content for `filename`. Returns the SHA-256 hex digest.
    ///
    /// The staging file is created exclusively under a fresh random name, so
    /// it never aliases another stored file; the rename replaces only `filename`.
    pub fn write(&self, filename: &str, content: &[u8]) -> Result<String> {
        let path = self.path_for(filename)?;

        let mut staged = tempfile::NamedTempFile::new_in(&self.root)?;
        staged.write_all(content)?;
        staged.persist(&path).map_err(|e| e.error)?;
        Ok(checksum(content))
    }

    /// Read up to `chunk_size` bytes at `chunk_number * chunk_size`.
    ///
    /// `None` when no file is stored under `filename`.
    pub fn read_chunk(
        &self,
        filename: &str,
        chunk_number: u64,
        chunk_size: u64,
    ) -> Result<Option<ChunkRead>> {
        let path = self.path_for(filename)?;
        let mut file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let Some(offset) = chunk_number.checked_mul(chunk_size) else {
            // Past any representable end
            return Ok(Some(ChunkRead {
                data: Vec::new(),
                end_of_file: true,
            }));
        };

        file.seek(SeekFrom::Start(offset))?;
        let mut data = Vec::new();
        file.take(chunk_size).read_to_end(&mut data)?;

        let end_of_file = (data.len() as u64) < chunk_size;
        Ok(Some(ChunkRead { data, end_of_file }))
    }

    /// Delete the stored content. Returns whether a file was removed.
    pub fn remove(&self, filename: &str) -> Result<bool> {
        let path = self.path_for(filename)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// SHA-256 hex digest of `data`.
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
