//! Metadata store -- filename -> owner/size/timestamp records.
//!
//! Every mutation is load -> modify -> write back. The write goes to a fresh
//! temp file in the same directory and is renamed into place; the in-memory
//! view is replaced only after the rename succeeds.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Result;

/// Timestamp format recorded on each entry (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub filename: String,
    pub owner: String,
    pub size: u64,
    pub timestamp: String,
}

impl MetadataEntry {
    /// New entry stamped with the current local time.
    pub fn new(filename: impl Into<String>, owner: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            owner: owner.into(),
            size,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// JSON-document-backed metadata store.
pub struct MetadataStore {
    path: PathBuf,
    entries: Vec<MetadataEntry>,
}

impl MetadataStore {
    /// Open the document at `path`, creating an empty one if missing.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut store = Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
        };

        if path.exists() {
            store.entries = store.load()?;
        } else {
            store.persist(&[])?;
            tracing::info!(path = %path.display(), "metadata: created empty document");
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full document from disk.
    pub fn load(&self) -> Result<Vec<MetadataEntry>> {
        let content = std::fs::read(&self.path)?;
        let entries: Vec<MetadataEntry> = serde_json::from_slice(&content)?;
        Ok(entries)
    }

    /// Every entry from every owner, in insertion order. No filtering by requester.
    pub fn list(&self) -> &[MetadataEntry] {
        &self.entries
    }

    pub fn get(&self, filename: &str) -> Option<&MetadataEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// Drop any entry with the same filename, append `entry`, write back.
    pub fn replace_or_insert(&mut self, entry: MetadataEntry) -> Result<()> {
        let mut entries = self.load()?;
        entries.retain(|e| e.filename != entry.filename);
        entries.push(entry);

        self.persist(&entries)?;
        self.entries = entries;
        Ok(())
    }

    /// Remove the entry matching both `filename` and `owner`.
    ///
    /// A non-owner and a missing file both yield `false`.
    pub fn remove(&mut self, filename: &str, owner: &str) -> Result<bool> {
        let mut entries = self.load()?;
        let Some(pos) = entries
            .iter()
            .position(|e| e.filename == filename && e.owner == owner)
        else {
            return Ok(false);
        };
        entries.remove(pos);

        self.persist(&entries)?;
        self.entries = entries;
        Ok(true)
    }

    fn persist(&self, entries: &[MetadataEntry]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let json = serde_json::to_vec_pretty(entries)?;
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(&json)?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
