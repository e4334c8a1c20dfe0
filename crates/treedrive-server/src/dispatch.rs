//! Request dispatcher -- one decoded request in, one response out.
//!
//! Owns all server state: sessions, pending uploads, metadata, content.
//! Every failure maps to exactly one wire response; nothing here closes a
//! connection.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use treedrive_protocol::{
    ack, ChunkPayload, FileInfo, ProtocolError, Request, RequestCodec, Response,
};
use treedrive_storage::{
    validate_filename, ContentStore, MetadataEntry, MetadataStore, StorageError,
};

use crate::assembly::{ChunkAssemblyBuffer, NoChunksReceived, UploadKey};
use crate::session::SessionRegistry;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("not authenticated: {0:?}")]
    NotAuthenticated(String),
    #[error(transparent)]
    NoChunksReceived(#[from] NoChunksReceived),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("file not found or unauthorized: {0}")]
    NotFoundOrUnauthorized(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DispatchError {
    pub fn into_response(self) -> Response {
        match self {
            DispatchError::NotAuthenticated(_) => Response::text(ack::LOGIN_REQUIRED),
            DispatchError::NoChunksReceived(_) => Response::text(ack::NO_CHUNKS),
            DispatchError::FileNotFound(_) => Response::error(ack::FILE_NOT_FOUND),
            DispatchError::NotFoundOrUnauthorized(_) => Response::text(ack::DELETE_DENIED),
            DispatchError::InvalidRequest(_) | DispatchError::Storage(_) => {
                Response::text(ack::PROCESSING_ERROR)
            }
        }
    }
}

type DispatchResult = Result<Response, DispatchError>;

fn file_info(entry: &MetadataEntry) -> FileInfo {
    FileInfo {
        filename: entry.filename.clone(),
        owner: entry.owner.clone(),
        size: entry.size,
        timestamp: entry.timestamp.clone(),
    }
}

pub struct Dispatcher {
    sessions: SessionRegistry,
    uploads: ChunkAssemblyBuffer,
    metadata: MetadataStore,
    content: ContentStore,
}

impl Dispatcher {
    pub fn new(metadata: MetadataStore, content: ContentStore) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            uploads: ChunkAssemblyBuffer::new(),
            metadata,
            content,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn uploads(&self) -> &ChunkAssemblyBuffer {
        &self.uploads
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Decode the bytes of one read and dispatch them.
    ///
    /// `None` when the read held only whitespace.
    pub fn handle_message(&mut self, codec: &mut RequestCodec, src: &mut BytesMut) -> Option<Response> {
        match codec.decode(src) {
            Ok(Some(request)) => Some(self.dispatch(request)),
            Ok(None) => None,
            Err(ProtocolError::UnknownOperation(command)) => {
                tracing::warn!(command = %command, "dispatch: unknown command");
                Some(Response::text(ack::INVALID_COMMAND))
            }
            Err(e) => {
                tracing::warn!(error = %e, "dispatch: undecodable message");
                Some(Response::text(ack::PROCESSING_ERROR))
            }
        }
    }

    pub fn dispatch(&mut self, request: Request) -> Response {
        let command = request.command();
        match self.route(request) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(command, error = %e, "dispatch: request failed");
                e.into_response()
            }
        }
    }

    fn route(&mut self, request: Request) -> DispatchResult {
        match request {
            Request::Login { username } => Ok(self.login(&username)),
            Request::Push {
                filename,
                chunk_number,
                chunk_size,
                data,
                username,
            } => self.require_login(&username, |d| {
                d.push(&filename, chunk_number, chunk_size, data, &username)
            }),
            // Not guarded: it only finds chunks that a logged-in PUSH stored.
            Request::UploadComplete {
                filename,
                size,
                username,
            } => self.complete_upload(&filename, size, &username),
            Request::Get {
                filename,
                chunk_number,
                chunk_size,
                username,
            } => self.require_login(&username, |d| d.get(&filename, chunk_number, chunk_size)),
            Request::List => Ok(self.list()),
            Request::Delete { filename, username } => {
                self.require_login(&username, |d| d.delete(&filename, &username))
            }
        }
    }

    /// Run `handler` only if `username` has logged in.
    fn require_login<F>(&mut self, username: &str, handler: F) -> DispatchResult
    where
        F: FnOnce(&mut Self) -> DispatchResult,
    {
        if !self.sessions.is_authenticated(username) {
            return Err(DispatchError::NotAuthenticated(username.to_string()));
        }
        handler(self)
    }

    fn login(&mut self, username: &str) -> Response {
        self.sessions.authenticate(username);
        Response::text(ack::LOGIN_OK)
    }

    fn push(
        &mut self,
        filename: &str,
        chunk_number: u64,
        chunk_size: u64,
        data: Vec<u8>,
        username: &str,
    ) -> DispatchResult {
        validate_filename(filename)?;
        if data.len() as u64 != chunk_size {
            tracing::debug!(
                filename,
                chunk_number,
                declared = chunk_size,
                actual = data.len(),
                "push: chunk_size differs from payload"
            );
        }

        let key = UploadKey::new(filename, username);
        self.uploads.accept(key.clone(), chunk_number, data);
        tracing::debug!(
            filename,
            username,
            chunk_number,
            held = self.uploads.chunk_count(&key),
            pending = self.uploads.pending_uploads(),
            "push: chunk buffered"
        );
        Ok(Response::text(ack::chunk_received(chunk_number)))
    }

    /// Store the assembled upload. The pending set is dropped only after both
    /// the content and the metadata entry are written, so a failed store can
    /// be retried with another UPLOAD_COMPLETE.
    fn complete_upload(&mut self, filename: &str, declared_size: u64, username: &str) -> DispatchResult {
        let key = UploadKey::new(filename, username);
        let content = self.uploads.assemble(&key)?;

        let size = content.len() as u64;
        if size != declared_size {
            tracing::warn!(
                filename,
                declared_size,
                size,
                "upload: declared size differs from received bytes"
            );
        }

        let checksum = self.content.write(filename, &content)?;
        self.metadata
            .replace_or_insert(MetadataEntry::new(filename, username, size))?;
        self.uploads.discard(&key);

        tracing::info!(filename, owner = username, size, %checksum, "upload: file stored");
        Ok(Response::text(ack::UPLOAD_OK))
    }

    fn get(&mut self, filename: &str, chunk_number: u64, chunk_size: u64) -> DispatchResult {
        if chunk_size == 0 {
            return Err(DispatchError::InvalidRequest("chunk_size must be positive".into()));
        }

        let chunk = self
            .content
            .read_chunk(filename, chunk_number, chunk_size)?
            .ok_or_else(|| DispatchError::FileNotFound(filename.to_string()))?;

        tracing::debug!(
            filename,
            chunk_number,
            len = chunk.data.len(),
            end_of_file = chunk.end_of_file,
            "get: chunk served"
        );
        Ok(Response::Chunk(ChunkPayload {
            filename: filename.to_string(),
            chunk_number,
            data: chunk.data,
            end_of_file: chunk.end_of_file,
        }))
    }

    /// Every stored file, regardless of requester or login.
    fn list(&self) -> Response {
        Response::Listing(self.metadata.list().iter().map(file_info).collect())
    }

    fn delete(&mut self, filename: &str, username: &str) -> DispatchResult {
        if !self.metadata.remove(filename, username)? {
            return Err(DispatchError::NotFoundOrUnauthorized(filename.to_string()));
        }

        match self.content.remove(filename) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(filename, "delete: metadata entry had no stored content"),
            Err(e) => tracing::warn!(filename, error = %e, "delete: failed to remove content"),
        }

        tracing::info!(filename, owner = username, "delete: file removed");
        Ok(Response::text(ack::DELETE_OK))
    }
}
