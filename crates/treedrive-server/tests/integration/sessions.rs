//! Login gating and ownership over TCP.

use treedrive_client::ClientError;
use treedrive_protocol::ack;

use crate::harness::{payload, write_local, TestServer};

#[tokio::test]
async fn test_guarded_commands_require_login() {
    let server = TestServer::start().await.unwrap();
    let client = server.client();
    let src = server.scratch("src");
    let dst = server.scratch("dst");
    let path = write_local(&src, "x.txt", b"data");

    let err = client.upload(&path, "mallory").await.unwrap_err();
    assert!(matches!(&err, ClientError::Server(m) if m == ack::LOGIN_REQUIRED), "{err:?}");
    let err = client.download("x.txt", "mallory", &dst).await.unwrap_err();
    assert!(matches!(&err, ClientError::Server(m) if m == ack::LOGIN_REQUIRED), "{err:?}");
    assert_eq!(
        client.delete("x.txt", "mallory").await.unwrap(),
        ack::LOGIN_REQUIRED
    );

    assert!(server.stored_bytes("x.txt").is_none());
    assert!(server.metadata_on_disk().is_empty());

    server.shutdown();
}

/// LIST needs no login.
#[tokio::test]
async fn test_list_is_public() {
    let server = TestServer::start().await.unwrap();
    assert!(server.client().list().await.unwrap().is_empty());
    server.shutdown();
}

/// alice uploads; bob can list and read but not delete; alice deletes.
#[tokio::test]
async fn test_owner_only_delete() {
    let server = TestServer::start().await.unwrap();
    let client = server.client();
    let src = server.scratch("src");
    let dst = server.scratch("dst");
    let data = payload(3000);
    let path = write_local(&src, "shared.bin", &data);

    client.login("alice").await.unwrap();
    client.upload(&path, "alice").await.unwrap();

    client.login("bob").await.unwrap();
    let files = client.list().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].owner, "alice");

    let down = client.download("shared.bin", "bob", &dst).await.unwrap();
    assert_eq!(std::fs::read(&down.path).unwrap(), data);

    assert_eq!(
        client.delete("shared.bin", "bob").await.unwrap(),
        ack::DELETE_DENIED
    );
    assert!(server.stored_bytes("shared.bin").is_some());

    assert_eq!(
        client.delete("shared.bin", "alice").await.unwrap(),
        ack::DELETE_OK
    );
    assert!(server.stored_bytes("shared.bin").is_none());
    assert!(client.list().await.unwrap().is_empty());
    assert!(server.metadata_on_disk().is_empty());

    server.shutdown();
}

/// A restarted server reads the persisted metadata.
#[tokio::test]
async fn test_metadata_survives_restart() {
    let first = TestServer::start().await.unwrap();
    let src = first.scratch("src");
    let path = write_local(&src, "keep.txt", b"persisted");
    let client = first.client();
    client.login("alice").await.unwrap();
    client.upload(&path, "alice").await.unwrap();

    let uploads = first.uploads_dir.clone();
    let metadata = first.metadata_file.clone();
    let second = TestServer::start_with(|cfg| {
        cfg.storage.uploads_dir = uploads.to_string_lossy().into_owned();
        cfg.storage.metadata_file = metadata.to_string_lossy().into_owned();
    })
    .await
    .unwrap();

    let files = second.client().list().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "keep.txt");

    second.shutdown();
    first.shutdown();
}
