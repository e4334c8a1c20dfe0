//! TreeDrive Protocol -- wire types, message codec, error taxonomy.
//!
//! TCP between client and server. One request per connection round trip.
//! Requests: one JSON document per read, `\n`-terminated by the client.
//! Responses: plain acknowledgment text or a compact JSON document, `\n`-terminated.

pub mod codec;
pub mod messages;

pub use codec::{RequestCodec, ResponseCodec};
pub use messages::*;

/// Canonical TCP port for both server listen and client default.
pub const DEFAULT_PORT: u16 = 8240;

/// Maximum bytes in one request or response, including the terminator.
/// The protocol does not frame messages across multiple reads.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Raw bytes per chunk. Base64 plus the JSON envelope must stay under
/// [`MAX_MESSAGE_SIZE`].
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Record separator appended to every encoded message.
pub const RECORD_SEPARATOR: u8 = b'\n';

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
