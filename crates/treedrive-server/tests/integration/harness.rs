//! Test harness for in-process treedrive-server integration tests.
//!
//! Provides TestServer: a multiplexer on an ephemeral loopback port with its
//! storage in a tempdir, driven on the test's own runtime.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use treedrive_client::Client;
use treedrive_server::config::ServerConfig;
use treedrive_storage::MetadataEntry;

/// A running in-process server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub uploads_dir: PathBuf,
    pub metadata_file: PathBuf,
    tempdir: tempfile::TempDir,
    handle: tokio::task::JoinHandle<()>,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Start with a config tweak applied over the test defaults.
    pub async fn start_with(tweak: impl FnOnce(&mut ServerConfig)) -> anyhow::Result<Self> {
        let tempdir = tempfile::tempdir()?;
        let uploads_dir = tempdir.path().join("uploads");
        let metadata_file = tempdir.path().join("metadata.json");

        let mut cfg = ServerConfig::default();
        cfg.server.listen_addr = "127.0.0.1:0".into();
        cfg.storage.uploads_dir = uploads_dir.to_string_lossy().into_owned();
        cfg.storage.metadata_file = metadata_file.to_string_lossy().into_owned();
        tweak(&mut cfg);

        let mux = treedrive_server::bind(&cfg).await?;
        let addr = mux.local_addr()?;
        let handle = tokio::spawn(mux.run());

        Ok(Self {
            addr,
            uploads_dir,
            metadata_file,
            tempdir,
            handle,
        })
    }

    pub fn client(&self) -> Client {
        Client::new(self.addr.to_string())
    }

    pub fn client_with_chunk_size(&self, chunk_size: usize) -> Client {
        self.client().with_chunk_size(chunk_size)
    }

    /// Scratch directory for local source and download files.
    pub fn scratch(&self, name: &str) -> PathBuf {
        let dir = self.tempdir.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Metadata document as persisted on disk.
    pub fn metadata_on_disk(&self) -> Vec<MetadataEntry> {
        let raw = std::fs::read_to_string(&self.metadata_file).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    pub fn stored_bytes(&self, filename: &str) -> Option<Vec<u8>> {
        std::fs::read(self.uploads_dir.join(filename)).ok()
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

/// Deterministic, non-repeating-per-chunk test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + i / 251) as u8).collect()
}

pub fn write_local(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}
