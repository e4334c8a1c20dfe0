//! Configuration types for treedrive-client.

use serde::{Deserialize, Serialize};
use std::path::Path;

use treedrive_protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT, MAX_MESSAGE_SIZE};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    /// Raw bytes per PUSH and per GET.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: String,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            chunk_size: default_chunk_size(),
            downloads_dir: default_downloads_dir(),
            max_message_size: default_max_message_size(),
        }
    }
}

fn default_server_addr() -> String {
    format!("127.0.0.1:{DEFAULT_PORT}")
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_downloads_dir() -> String {
    "downloads".into()
}
fn default_max_message_size() -> usize {
    MAX_MESSAGE_SIZE
}

impl ClientConfig {
    /// Load config from file, or use defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ClientConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}
