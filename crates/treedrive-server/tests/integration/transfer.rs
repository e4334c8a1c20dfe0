//! Chunked upload and download over real TCP connections.

use treedrive_client::ClientError;
use treedrive_protocol::ack;

use crate::harness::{payload, write_local, TestServer};

/// 2500 bytes at 1024 per chunk: three GETs, eof only on the last.
#[tokio::test]
async fn test_round_trip_chunk_count() {
    let server = TestServer::start().await.unwrap();
    let client = server.client_with_chunk_size(1024);
    let src = server.scratch("src");
    let dst = server.scratch("dst");
    let data = payload(2500);
    let path = write_local(&src, "report.bin", &data);

    assert_eq!(client.login("alice").await.unwrap(), ack::LOGIN_OK);
    let up = client.upload(&path, "alice").await.unwrap();
    assert_eq!(up.filename, "report.bin");
    assert_eq!(up.chunks, 3);
    assert_eq!(up.bytes, 2500);
    assert_eq!(server.stored_bytes("report.bin").unwrap(), data);

    let down = client.download("report.bin", "alice", &dst).await.unwrap();
    assert_eq!(down.chunks, 3);
    assert_eq!(down.bytes, 2500);
    assert_eq!(std::fs::read(&down.path).unwrap(), data);

    server.shutdown();
}

/// Exact multiple of the chunk size ends with an empty eof chunk.
#[tokio::test]
async fn test_exact_multiple_trailing_empty_chunk() {
    let server = TestServer::start().await.unwrap();
    let client = server.client_with_chunk_size(512);
    let src = server.scratch("src");
    let dst = server.scratch("dst");
    let data = payload(1024);
    let path = write_local(&src, "even.bin", &data);

    client.login("alice").await.unwrap();
    let up = client.upload(&path, "alice").await.unwrap();
    assert_eq!(up.chunks, 2);

    let down = client.download("even.bin", "alice", &dst).await.unwrap();
    assert_eq!(down.chunks, 3);
    assert_eq!(std::fs::read(&down.path).unwrap(), data);

    server.shutdown();
}

#[tokio::test]
async fn test_empty_file_round_trip() {
    let server = TestServer::start().await.unwrap();
    let client = server.client();
    let src = server.scratch("src");
    let dst = server.scratch("dst");
    let path = write_local(&src, "empty.txt", b"");

    client.login("alice").await.unwrap();
    let up = client.upload(&path, "alice").await.unwrap();
    assert_eq!(up.chunks, 1);
    assert_eq!(up.bytes, 0);

    let down = client.download("empty.txt", "alice", &dst).await.unwrap();
    assert_eq!(down.bytes, 0);
    assert!(std::fs::read(&down.path).unwrap().is_empty());
    assert_eq!(server.metadata_on_disk()[0].size, 0);

    server.shutdown();
}

/// Upload stores under the final path component only.
#[tokio::test]
async fn test_upload_uses_basename() {
    let server = TestServer::start().await.unwrap();
    let client = server.client();
    let nested = server.scratch("src/deep/er");
    let path = write_local(&nested, "leaf.txt", b"hello");

    client.login("alice").await.unwrap();
    client.upload(&path, "alice").await.unwrap();

    assert_eq!(server.stored_bytes("leaf.txt").unwrap(), b"hello");
    let files = client.list().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "leaf.txt");
    assert_eq!(files[0].owner, "alice");
    assert_eq!(files[0].size, 5);

    server.shutdown();
}

/// Re-upload replaces content and the single metadata entry.
#[tokio::test]
async fn test_reupload_replaces() {
    let server = TestServer::start().await.unwrap();
    let client = server.client();
    let src = server.scratch("src");

    client.login("alice").await.unwrap();
    let path = write_local(&src, "notes.txt", b"first version");
    client.upload(&path, "alice").await.unwrap();
    let path = write_local(&src, "notes.txt", b"v2");
    client.upload(&path, "alice").await.unwrap();

    assert_eq!(server.stored_bytes("notes.txt").unwrap(), b"v2");
    let entries = server.metadata_on_disk();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].size, 2);

    server.shutdown();
}

/// Two users uploading at once, each PUSH a separate connection.
#[tokio::test]
async fn test_interleaved_uploads() {
    let server = TestServer::start().await.unwrap();
    let alice = server.client_with_chunk_size(100);
    let bob = server.client_with_chunk_size(64);
    let src_a = server.scratch("a");
    let src_b = server.scratch("b");
    let data_a = payload(1000);
    let data_b: Vec<u8> = payload(700).into_iter().rev().collect();
    let path_a = write_local(&src_a, "a.bin", &data_a);
    let path_b = write_local(&src_b, "b.bin", &data_b);

    alice.login("alice").await.unwrap();
    bob.login("bob").await.unwrap();
    let (ra, rb) = tokio::join!(alice.upload(&path_a, "alice"), bob.upload(&path_b, "bob"));
    ra.unwrap();
    rb.unwrap();

    assert_eq!(server.stored_bytes("a.bin").unwrap(), data_a);
    assert_eq!(server.stored_bytes("b.bin").unwrap(), data_b);
    assert_eq!(alice.list().await.unwrap().len(), 2);

    server.shutdown();
}

#[tokio::test]
async fn test_download_missing_file() {
    let server = TestServer::start().await.unwrap();
    let client = server.client();
    let dst = server.scratch("dst");

    client.login("alice").await.unwrap();
    let err = client.download("ghost.txt", "alice", &dst).await.unwrap_err();
    match err {
        ClientError::Server(msg) => assert_eq!(msg, ack::FILE_NOT_FOUND),
        other => panic!("expected server error, got {other:?}"),
    }
    assert!(!dst.join("ghost.txt").exists());

    server.shutdown();
}

#[tokio::test]
async fn test_connection_refused() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = treedrive_client::Client::new(addr.to_string());
    let err = client.login("alice").await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectionRefused(_)), "{err:?}");
    assert!(err.to_string().contains("Is the server running?"));
}

/// A stored name shaped like a staging file survives a later upload.
#[tokio::test]
async fn test_lookalike_names_stay_independent() {
    let server = TestServer::start().await.unwrap();
    let client = server.client();
    let src = server.scratch("src");
    let dst = server.scratch("dst");

    client.login("alice").await.unwrap();
    let dotted = write_local(&src, ".x.partial", b"dotted name");
    client.upload(&dotted, "alice").await.unwrap();
    let plain = write_local(&src, "x", b"plain name");
    client.upload(&plain, "alice").await.unwrap();

    let mut names: Vec<_> = client
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.filename)
        .collect();
    names.sort();
    assert_eq!(names, vec![".x.partial", "x"]);

    let down = client.download(".x.partial", "alice", &dst).await.unwrap();
    assert_eq!(std::fs::read(&down.path).unwrap(), b"dotted name");
    let down = client.download("x", "alice", &dst).await.unwrap();
    assert_eq!(std::fs::read(&down.path).unwrap(), b"plain name");

    server.shutdown();
}

/// A GET for a name the server lacks leaves the local copy alone.
#[tokio::test]
async fn test_failed_download_keeps_local_copy() {
    let server = TestServer::start().await.unwrap();
    let client = server.client();
    let dst = server.scratch("dst");
    let local = write_local(&dst, "notes.txt", b"my local notes");

    client.login("alice").await.unwrap();
    let err = client.download("notes.txt", "alice", &dst).await.unwrap_err();
    assert!(matches!(&err, ClientError::Server(m) if m == ack::FILE_NOT_FOUND), "{err:?}");

    assert_eq!(std::fs::read(&local).unwrap(), b"my local notes");
    assert_eq!(std::fs::read_dir(&dst).unwrap().count(), 1);

    server.shutdown();
}
