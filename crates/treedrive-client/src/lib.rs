//! TreeDrive Client -- request driver and interactive shell helpers.
//!
//! One TCP connection per request, closed after the response. Uploads and
//! downloads are a loop of one request per chunk.

pub mod config;
pub mod driver;
pub mod shell;

pub use driver::{Client, DownloadReport, UploadReport};

use std::path::PathBuf;

use treedrive_protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Could not connect to the server at {0}. Is the server running?")]
    ConnectionRefused(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The server answered with an error text or error document.
    #[error("{0}")]
    Server(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("Please log in first")]
    NotLoggedIn,
    #[error("File not found: {}", .0.display())]
    LocalFileNotFound(PathBuf),
    #[error("invalid filename: {0}")]
    InvalidFilename(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
