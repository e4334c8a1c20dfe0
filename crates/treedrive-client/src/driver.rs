//! Request driver: one connection per request, chunked upload and download.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};

use treedrive_protocol::{
    ack, FileInfo, Request, RequestCodec, Response, ResponseCodec, DEFAULT_CHUNK_SIZE,
    MAX_MESSAGE_SIZE,
};

use crate::config::ClientSection;
use crate::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// Name the file was stored under on the server.
    pub filename: String,
    pub chunks: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    /// GET round trips, including a trailing empty chunk when the size is
    /// an exact multiple of the chunk size.
    pub chunks: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Client {
    server_addr: String,
    chunk_size: usize,
    max_message_size: usize,
}

impl Client {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn from_config(cfg: &ClientSection) -> Self {
        Self::new(cfg.server_addr.clone())
            .with_chunk_size(cfg.chunk_size)
            .with_max_message_size(cfg.max_message_size)
    }

    /// Zero is clamped to one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Open a connection, send one request, read one response, close.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let command = request.command();
        let mut stream = TcpStream::connect(&self.server_addr)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::ConnectionRefused => {
                    ClientError::ConnectionRefused(self.server_addr.clone())
                }
                _ => ClientError::Io(e),
            })?;

        let mut out = BytesMut::new();
        RequestCodec::new(self.max_message_size).encode(request, &mut out)?;
        stream.write_all(&out).await?;

        let mut codec = ResponseCodec::new(self.max_message_size);
        let mut buf = BytesMut::with_capacity(self.max_message_size);
        let response = loop {
            if let Some(response) = codec.decode(&mut buf)? {
                break response;
            }
            let n = stream.read_buf(&mut buf).await?;
            if n == 0 {
                match codec.decode_eof(&mut buf)? {
                    Some(response) => break response,
                    None => {
                        return Err(ClientError::UnexpectedResponse(
                            "connection closed without a response".into(),
                        ))
                    }
                }
            }
        };

        tracing::debug!(command, "response received");
        Ok(response)
    }

    /// Returns the server's reply text; a successful login is
    /// [`ack::LOGIN_OK`].
    pub async fn login(&self, username: &str) -> Result<String> {
        let response = self
            .send(Request::Login {
                username: username.into(),
            })
            .await?;
        expect_text(response)
    }

    pub async fn list(&self) -> Result<Vec<FileInfo>> {
        match self.send(Request::List).await? {
            Response::Listing(files) => Ok(files),
            Response::Text(text) => Err(ClientError::Server(text)),
            Response::Error(doc) => Err(ClientError::Server(doc.error)),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the server's reply text: [`ack::DELETE_OK`] or the denial.
    pub async fn delete(&self, filename: &str, username: &str) -> Result<String> {
        let response = self
            .send(Request::Delete {
                filename: filename.into(),
                username: username.into(),
            })
            .await?;
        expect_text(response)
    }

    /// Upload `path` under its final path component.
    ///
    /// An empty file is sent as a single empty chunk so the server records it.
    pub async fn upload(&self, path: &Path, username: &str) -> Result<UploadReport> {
        if !path.is_file() {
            return Err(ClientError::LocalFileNotFound(path.to_path_buf()));
        }
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidFilename(path.display().to_string()))?
            .to_string();

        let mut file = File::open(path).await?;
        let mut chunk = vec![0u8; self.chunk_size];
        let mut chunk_number = 0u64;
        let mut total = 0u64;

        loop {
            let n = read_full(&mut file, &mut chunk).await?;
            if n == 0 && chunk_number > 0 {
                break;
            }

            let reply = self
                .send(Request::Push {
                    filename: filename.clone(),
                    chunk_number,
                    chunk_size: self.chunk_size as u64,
                    data: chunk[..n].to_vec(),
                    username: username.into(),
                })
                .await
                .and_then(expect_text)?;
            if reply != ack::chunk_received(chunk_number) {
                return Err(ClientError::Server(reply));
            }
            tracing::debug!(filename = %filename, chunk_number, bytes = n, "chunk pushed");

            chunk_number += 1;
            total += n as u64;
            if n < self.chunk_size {
                break;
            }
        }

        let reply = self
            .send(Request::UploadComplete {
                filename: filename.clone(),
                size: total,
                username: username.into(),
            })
            .await
            .and_then(expect_text)?;
        if reply != ack::UPLOAD_OK {
            return Err(ClientError::Server(reply));
        }

        Ok(UploadReport {
            filename,
            chunks: chunk_number,
            bytes: total,
        })
    }

    /// Download `filename` into `dest_dir`, one GET per chunk until the
    /// server flags end of file.
    ///
    /// Chunks go to a staging file beside the target, renamed over it only
    /// once the last chunk arrives. On failure an existing local copy is
    /// left untouched.
    pub async fn download(
        &self,
        filename: &str,
        username: &str,
        dest_dir: &Path,
    ) -> Result<DownloadReport> {
        let mut components = Path::new(filename).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(ClientError::InvalidFilename(filename.into()));
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(filename);

        // Dropping the staged path removes the file on every early return.
        let (staged_file, staged_path) = tempfile::Builder::new()
            .prefix(".treedrive-")
            .suffix(".download")
            .tempfile_in(dest_dir)?
            .into_parts();
        let mut file = File::from_std(staged_file);

        let (chunks, bytes) = self.fetch_chunks(filename, username, &mut file).await?;
        file.flush().await?;
        drop(file);
        staged_path.persist(&path).map_err(|e| e.error)?;

        Ok(DownloadReport {
            path,
            chunks,
            bytes,
        })
    }

    async fn fetch_chunks(
        &self,
        filename: &str,
        username: &str,
        file: &mut File,
    ) -> Result<(u64, u64)> {
        let mut chunk_number = 0u64;
        let mut bytes = 0u64;

        loop {
            let response = self
                .send(Request::Get {
                    filename: filename.into(),
                    chunk_number,
                    chunk_size: self.chunk_size as u64,
                    username: username.into(),
                })
                .await?;

            let chunk = match response {
                Response::Chunk(chunk) => chunk,
                Response::Error(doc) => return Err(ClientError::Server(doc.error)),
                Response::Text(text) => return Err(ClientError::Server(text)),
                other => return Err(unexpected(&other)),
            };
            if chunk.chunk_number != chunk_number {
                return Err(ClientError::UnexpectedResponse(format!(
                    "expected chunk {chunk_number}, got {}",
                    chunk.chunk_number
                )));
            }

            file.write_all(&chunk.data).await?;
            bytes += chunk.data.len() as u64;
            chunk_number += 1;

            if chunk.end_of_file {
                return Ok((chunk_number, bytes));
            }
        }
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn expect_text(response: Response) -> Result<String> {
    match response {
        Response::Text(text) => Ok(text),
        Response::Error(doc) => Err(ClientError::Server(doc.error)),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(response: &Response) -> ClientError {
    let kind = match response {
        Response::Text(_) => "text",
        Response::Chunk(_) => "chunk",
        Response::Error(_) => "error document",
        Response::Listing(_) => "listing",
    };
    ClientError::UnexpectedResponse(format!("{kind} response"))
}
