//! Configuration types for treedrive-server.
//! Parsed from a TOML file; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use treedrive_protocol::{DEFAULT_PORT, MAX_MESSAGE_SIZE};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Bytes accepted per read and per response.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_message_size: default_max_message_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            metadata_file: default_metadata_file(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}
fn default_max_message_size() -> usize {
    MAX_MESSAGE_SIZE
}
fn default_uploads_dir() -> String {
    "uploads".into()
}
fn default_metadata_file() -> String {
    "metadata.json".into()
}

impl ServerConfig {
    /// Load config from file, or use defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ServerConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}
