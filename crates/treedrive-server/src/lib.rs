//! TreeDrive Server -- library crate for the file storage server.
//!
//! Re-exports all internal modules so integration tests can build a server
//! in-process and inspect its state.

pub mod assembly;
pub mod config;
pub mod dispatch;
pub mod multiplexer;
pub mod session;

use std::path::PathBuf;

use treedrive_storage::{ContentStore, MetadataStore};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::multiplexer::Multiplexer;

/// Open storage and bind the listener described by `cfg`.
pub async fn bind(cfg: &ServerConfig) -> anyhow::Result<Multiplexer> {
    let metadata_path = expand_tilde(&cfg.storage.metadata_file);
    let metadata = MetadataStore::open(&metadata_path)?;
    tracing::info!(
        path = %metadata_path.display(),
        files = metadata.list().len(),
        "metadata opened"
    );

    let uploads_dir = expand_tilde(&cfg.storage.uploads_dir);
    let content = ContentStore::open(&uploads_dir)?;
    tracing::info!(dir = %uploads_dir.display(), "uploads directory opened");

    let dispatcher = Dispatcher::new(metadata, content);
    let mux = Multiplexer::bind(
        &cfg.server.listen_addr,
        dispatcher,
        cfg.server.max_message_size,
    )
    .await?;
    Ok(mux)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs_or_home() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn dirs_or_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
