//! Wire message types.
//!
//! Requests are field-named JSON documents tagged by `command`. Unknown fields
//! are ignored so peers can add fields within a command kind.

use serde::{Deserialize, Serialize};

// ============================================================================
// Requests
// ============================================================================

/// One client request. The `command` field selects the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Login {
        username: String,
    },
    Push {
        filename: String,
        chunk_number: u64,
        chunk_size: u64,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        username: String,
    },
    UploadComplete {
        filename: String,
        size: u64,
        username: String,
    },
    Get {
        filename: String,
        chunk_number: u64,
        chunk_size: u64,
        username: String,
    },
    List,
    Delete {
        filename: String,
        username: String,
    },
}

impl Request {
    /// Every `command` value the server understands.
    pub const COMMANDS: &'static [&'static str] = &[
        "LOGIN",
        "PUSH",
        "UPLOAD_COMPLETE",
        "GET",
        "LIST",
        "DELETE",
    ];

    /// Wire name of this request's command.
    pub fn command(&self) -> &'static str {
        match self {
            Request::Login { .. } => "LOGIN",
            Request::Push { .. } => "PUSH",
            Request::UploadComplete { .. } => "UPLOAD_COMPLETE",
            Request::Get { .. } => "GET",
            Request::List => "LIST",
            Request::Delete { .. } => "DELETE",
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// One server response: plain text or a structured document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Acknowledgment or error text, sent without JSON quoting.
    Text(String),
    /// GET success.
    Chunk(ChunkPayload),
    /// GET failure.
    Error(ErrorDocument),
    /// LIST success.
    Listing(Vec<FileInfo>),
}

impl Response {
    pub fn text(s: impl Into<String>) -> Self {
        Response::Text(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Response::Error(ErrorDocument { error: s.into() })
    }
}

/// One slice of a stored file, addressed by `chunk_number * chunk_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub filename: String,
    pub chunk_number: u64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Fewer bytes than requested were available.
    pub end_of_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub error: String,
}

/// Listing row for one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub owner: String,
    pub size: u64,
    pub timestamp: String,
}

/// Literal response texts. Clients match on some of these.
pub mod ack {
    pub const LOGIN_OK: &str = "Login successful";
    pub const UPLOAD_OK: &str = "File uploaded successfully";
    pub const NO_CHUNKS: &str = "Error: No chunks received";
    pub const DELETE_OK: &str = "File deleted successfully";
    pub const DELETE_DENIED: &str = "File not found or unauthorized";
    pub const LOGIN_REQUIRED: &str = "Please log in first";
    pub const INVALID_COMMAND: &str = "Invalid command";
    pub const PROCESSING_ERROR: &str = "Error processing command";
    pub const FILE_NOT_FOUND: &str = "File not found";

    pub fn chunk_received(chunk_number: u64) -> String {
        format!("Chunk {chunk_number} received")
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Serialize/deserialize Vec<u8> as base64 string.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
