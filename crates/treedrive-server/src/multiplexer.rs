//! Connection multiplexer -- one control loop over the listener and every
//! open connection.
//!
//! Each readiness event is handled to completion before the next wait:
//! accept and register, or one bounded read -> one dispatch -> one response
//! write. At most one message per connection per event. Disk I/O inside the
//! dispatcher is synchronous, so a slow disk stalls every connection.
//!
//! A zero-byte read or read error deregisters and closes the connection
//! before the next wait.
//!
//! Readiness is polled starting just past the connection served last, so a
//! connection that always has data cannot starve the others.

use bytes::BytesMut;
use std::collections::BTreeMap;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Encoder;

use treedrive_protocol::{ack, RequestCodec, Response, ResponseCodec, RECORD_SEPARATOR};

use crate::dispatch::Dispatcher;

pub type ConnectionId = u64;

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Readable(ConnectionId, io::Result<()>),
}

pub struct Multiplexer {
    listener: TcpListener,
    connections: BTreeMap<ConnectionId, Connection>,
    next_id: ConnectionId,
    last_served: Option<ConnectionId>,
    dispatcher: Dispatcher,
    max_message_size: usize,
}

impl Multiplexer {
    /// Bind the listening endpoint.
    pub async fn bind(
        listen_addr: &str,
        dispatcher: Dispatcher,
        max_message_size: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(listen_addr).await?;
        Ok(Self {
            listener,
            connections: BTreeMap::new(),
            next_id: 0,
            last_served: None,
            dispatcher,
            max_message_size,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serve forever.
    pub async fn run(mut self) {
        tracing::info!(
            addr = ?self.listener.local_addr().ok(),
            max_message_size = self.max_message_size,
            "multiplexer: serving"
        );
        loop {
            self.step().await;
        }
    }

    /// Wait for one readiness event and handle it.
    pub async fn step(&mut self) {
        match self.next_event().await {
            Event::Accepted(Ok((stream, peer))) => self.register(stream, peer),
            Event::Accepted(Err(e)) => {
                tracing::warn!(error = %e, "multiplexer: accept failed");
            }
            Event::Readable(id, Ok(())) => {
                self.last_served = Some(id);
                self.service(id).await
            }
            Event::Readable(id, Err(e)) => {
                self.last_served = Some(id);
                self.deregister(id, &e.to_string())
            }
        }
    }

    async fn next_event(&self) -> Event {
        tokio::select! {
            accepted = self.listener.accept() => Event::Accepted(accepted),
            (id, ready) = next_readable(&self.connections, self.last_served) => {
                Event::Readable(id, ready)
            }
        }
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(id, Connection { stream, peer });
        tracing::info!(
            conn = id,
            %peer,
            open = self.connections.len(),
            "multiplexer: accepted connection"
        );
    }

    fn deregister(&mut self, id: ConnectionId, reason: &str) {
        if let Some(conn) = self.connections.remove(&id) {
            tracing::info!(
                conn = id,
                peer = %conn.peer,
                reason,
                open = self.connections.len(),
                "multiplexer: connection closed"
            );
        }
    }

    /// One bounded read, then at most one dispatch and one response write.
    async fn service(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };

        let mut buf = vec![0u8; self.max_message_size];
        let n = match conn.stream.try_read(&mut buf) {
            Ok(0) => return self.deregister(id, "peer closed"),
            Ok(n) => n,
            // Readiness was spurious
            Err(e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => return self.deregister(id, &e.to_string()),
        };
        tracing::debug!(conn = id, bytes = n, "multiplexer: read");

        let mut codec = RequestCodec::new(self.max_message_size);
        let mut frame = BytesMut::from(&buf[..n]);
        let Some(response) = self.dispatcher.handle_message(&mut codec, &mut frame) else {
            return;
        };
        let out = self.encode(response);

        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        if let Err(e) = conn.stream.write_all(&out).await {
            self.deregister(id, &e.to_string());
        }
    }

    /// Encode a response, substituting the generic error text if it is too large.
    fn encode(&self, response: Response) -> BytesMut {
        let mut codec = ResponseCodec::new(self.max_message_size);
        let mut out = BytesMut::new();
        if let Err(e) = codec.encode(response, &mut out) {
            tracing::warn!(error = %e, "multiplexer: response not sendable");
            out.clear();
            out.extend_from_slice(ack::PROCESSING_ERROR.as_bytes());
            out.extend_from_slice(&[RECORD_SEPARATOR]);
        }
        out
    }
}

/// Resolve when any registered connection is readable. Never resolves when
/// there are none.
///
/// Connections are polled in id order starting after `last_served`, wrapping
/// around; the first ready one in that order wins.
async fn next_readable(
    connections: &BTreeMap<ConnectionId, Connection>,
    last_served: Option<ConnectionId>,
) -> (ConnectionId, io::Result<()>) {
    if connections.is_empty() {
        return std::future::pending().await;
    }

    let start = last_served.map_or(0, |id| id.saturating_add(1));
    let rotated = connections.range(start..).chain(connections.range(..start));
    let waits = rotated.map(|(id, conn)| {
        let id = *id;
        Box::pin(async move { (id, conn.stream.readable().await) })
    });
    let (ready, _index, _rest) = futures_util::future::select_all(waits).await;
    ready
}
