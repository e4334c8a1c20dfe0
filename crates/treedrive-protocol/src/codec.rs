//! Newline-terminated JSON codecs for TCP streams.
//!
//! Requests: the server performs one bounded read and decodes the whole buffer
//! as one document (trailing whitespace tolerated). Responses: the client reads
//! until the `\n` terminator. Text responses are sent unquoted.

use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::messages::{ChunkPayload, ErrorDocument, FileInfo, Request, Response};
use crate::{ProtocolError, MAX_MESSAGE_SIZE, RECORD_SEPARATOR};

/// Decode one request document.
///
/// Distinguishes an unrecognised `command` (`UnknownOperation`) from every
/// other decoding failure (`MalformedMessage`).
pub fn decode_request(bytes: &[u8]) -> Result<Request, ProtocolError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?
        .trim();

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;

    let command = value
        .get("command")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ProtocolError::MalformedMessage("missing command field".into()))?;

    if !Request::COMMANDS.contains(&command) {
        return Err(ProtocolError::UnknownOperation(command.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

/// Structured response bodies, tried in order.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Chunk(ChunkPayload),
    Error(ErrorDocument),
    Listing(Vec<FileInfo>),
}

/// Decode one response line (terminator already stripped or absent).
pub fn decode_response(bytes: &[u8]) -> Result<Response, ProtocolError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?
        .trim();

    if !(text.starts_with('{') || text.starts_with('[')) {
        return Ok(Response::Text(text.to_string()));
    }

    let doc: Document =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;
    Ok(match doc {
        Document::Chunk(chunk) => Response::Chunk(chunk),
        Document::Error(err) => Response::Error(err),
        Document::Listing(files) => Response::Listing(files),
    })
}

fn check_size(size: usize, max: usize) -> Result<(), ProtocolError> {
    if size > max {
        return Err(ProtocolError::MessageTooLarge { size, max });
    }
    Ok(())
}

/// Request side: client encodes, server decodes.
#[derive(Debug, Clone, Copy)]
pub struct RequestCodec {
    max_size: usize,
}

impl RequestCodec {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl Decoder for RequestCodec {
    type Item = Request;
    type Error = ProtocolError;

    /// Consumes the whole buffer: the protocol does not frame requests across reads.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.iter().all(u8::is_ascii_whitespace) {
            src.clear();
            return Ok(None);
        }

        check_size(src.len(), self.max_size)?;
        let msg_bytes = src.split_to(src.len());
        decode_request(&msg_bytes).map(Some)
    }
}

impl Encoder<Request> for RequestCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;
        check_size(payload.len() + 1, self.max_size)?;

        dst.reserve(payload.len() + 1);
        dst.extend_from_slice(&payload);
        dst.put_u8(RECORD_SEPARATOR);
        Ok(())
    }
}

/// Response side: server encodes, client decodes.
#[derive(Debug, Clone, Copy)]
pub struct ResponseCodec {
    max_size: usize,
}

impl ResponseCodec {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl Default for ResponseCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl Decoder for ResponseCodec {
    type Item = Response;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(pos) = src.iter().position(|b| *b == RECORD_SEPARATOR) else {
            // No terminator yet
            check_size(src.len(), self.max_size)?;
            return Ok(None);
        };

        let line = src.split_to(pos + 1);
        decode_response(&line[..pos]).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(response) = self.decode(src)? {
            return Ok(Some(response));
        }
        if src.iter().all(u8::is_ascii_whitespace) {
            src.clear();
            return Ok(None);
        }

        // Peer closed without a terminator
        let rest = src.split_to(src.len());
        decode_response(&rest).map(Some)
    }
}

impl Encoder<Response> for ResponseCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = match &item {
            Response::Text(text) => text.as_bytes().to_vec(),
            Response::Chunk(chunk) => serde_json::to_vec(chunk)?,
            Response::Error(err) => serde_json::to_vec(err)?,
            Response::Listing(files) => serde_json::to_vec(files)?,
        };
        check_size(payload.len() + 1, self.max_size)?;

        dst.reserve(payload.len() + 1);
        dst.extend_from_slice(&payload);
        dst.put_u8(RECORD_SEPARATOR);
        Ok(())
    }
}
