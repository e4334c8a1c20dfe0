//! Chunk assembly buffer -- pending uploads held in memory until the upload
//! is stored.
//!
//! Pending uploads are keyed by (filename, uploader), so two users pushing the
//! same filename accumulate separately. One user running two uploads of the
//! same filename at once still shares a single pending set.
//!
//! No duplicate-index detection and no size bound: memory grows until the
//! set is discarded. Duplicate indices are all kept and concatenated in arrival order.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadKey {
    pub filename: String,
    pub uploader: String,
}

impl UploadKey {
    pub fn new(filename: &str, uploader: &str) -> Self {
        Self {
            filename: filename.to_string(),
            uploader: uploader.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub index: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
#[error("no chunks received for {filename}")]
pub struct NoChunksReceived {
    pub filename: String,
}

#[derive(Debug, Default)]
pub struct ChunkAssemblyBuffer {
    pending: HashMap<UploadKey, Vec<ChunkRecord>>,
}

impl ChunkAssemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the pending set for `key`, creating it if absent.
    pub fn accept(&mut self, key: UploadKey, index: u64, data: Vec<u8>) {
        let records = self.pending.entry(key).or_default();
        records.push(ChunkRecord { index, data });
    }

    /// Concatenate the pending chunks for `key` in ascending index order.
    ///
    /// The set stays pending until [`discard`](Self::discard), so a caller
    /// whose store fails can retry. The sort is stable: chunks sharing an
    /// index stay in arrival order.
    pub fn assemble(&self, key: &UploadKey) -> Result<Vec<u8>, NoChunksReceived> {
        let records = self.pending.get(key).ok_or_else(|| NoChunksReceived {
            filename: key.filename.clone(),
        })?;
        let mut ordered: Vec<&ChunkRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.index);

        let total: usize = ordered.iter().map(|r| r.data.len()).sum();
        let mut content = Vec::with_capacity(total);
        for record in ordered {
            content.extend_from_slice(&record.data);
        }
        Ok(content)
    }

    /// Drop the pending set for `key`. Returns whether one existed.
    pub fn discard(&mut self, key: &UploadKey) -> bool {
        self.pending.remove(key).is_some()
    }

    #[cfg(test)]
    pub fn is_pending(&self, key: &UploadKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Chunks held for `key`.
    pub fn chunk_count(&self, key: &UploadKey) -> usize {
        self.pending.get(key).map_or(0, Vec::len)
    }

    /// Number of uploads with at least one chunk.
    pub fn pending_uploads(&self) -> usize {
        self.pending.len()
    }
}
