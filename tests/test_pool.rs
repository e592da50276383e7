use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use url::Url;
use weft::Error;
use weft::client::pool::{ConnectionPool, PoolEntry, PoolKey};
use weft::transport::{PlainSocket, Transport};

fn key(url: &str) -> PoolKey {
    PoolKey::from_url(&Url::parse(url).unwrap()).unwrap()
}

fn entry(tls_context: &str) -> PoolEntry {
    PoolEntry {
        transport: Transport::Plain(PlainSocket::new()),
        buffer_size: 1024,
        tls_context: tls_context.to_string(),
    }
}

/// An entry over a live loopback connection, plus the server end of it.
async fn connected_entry(tls_context: &str) -> (PoolEntry, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap())
        .await
        .unwrap();
    let (server, _) = listener.accept().await.unwrap();
    let entry = PoolEntry {
        transport: Transport::Plain(PlainSocket::from_stream(client)),
        buffer_size: 1024,
        tls_context: tls_context.to_string(),
    };
    (entry, server)
}

#[test]
fn test_pool_key_default_ports() {
    assert_eq!(key("http://example.com/a"), PoolKey::new("http", "example.com", 80));
    assert_eq!(key("https://example.com/b"), PoolKey::new("https", "example.com", 443));
    assert_eq!(key("http://example.com:8080/"), PoolKey::new("http", "example.com", 8080));
}

#[test]
fn test_pool_key_equality_is_structural() {
    assert_eq!(key("HTTP://Example.COM/x"), key("http://example.com:80/y?z=1"));
    assert_ne!(key("http://example.com/"), key("https://example.com/"));
    assert_ne!(key("http://example.com/"), key("http://example.org/"));
    assert!(key("http://a.com/") < key("http://b.com/"));
}

#[test]
fn test_pool_key_rejects_other_schemes() {
    let url = Url::parse("ftp://example.com/file").unwrap();
    assert!(matches!(
        PoolKey::from_url(&url),
        Err(Error::UnsupportedScheme(scheme)) if scheme == "ftp"
    ));
}

#[tokio::test]
async fn test_claim_takes_the_entry_out() {
    let pool = ConnectionPool::new();
    let k = key("http://localhost:8080/");
    let (live, _server) = connected_entry("default").await;

    assert!(pool.claim(&k).is_none());
    pool.put(k.clone(), live);
    assert!(pool.contains(&k));
    assert_eq!(pool.len(), 1);

    let claimed = pool.claim(&k).unwrap();
    assert_eq!(claimed.tls_context, "default");
    assert!(pool.is_empty());
    assert!(pool.claim(&k).is_none());
}

#[tokio::test]
async fn test_put_replaces_existing_entry() {
    let pool = ConnectionPool::new();
    let k = key("http://localhost:8080/");
    let (first, _server_a) = connected_entry("first").await;
    let (second, _server_b) = connected_entry("second").await;

    pool.put(k.clone(), first);
    pool.put(k.clone(), second);

    assert_eq!(pool.len(), 1);
    assert_eq!(pool.claim(&k).unwrap().tls_context, "second");
}

#[tokio::test]
async fn test_claim_discards_connection_closed_by_peer() {
    let pool = ConnectionPool::new();
    let k = key("http://localhost:8080/");
    let (idle, server) = connected_entry("default").await;
    pool.put(k.clone(), idle);

    drop(server);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(pool.claim(&k).is_none());
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_claim_discards_unsolicited_bytes() {
    use tokio::io::AsyncWriteExt;

    let pool = ConnectionPool::new();
    let k = key("http://localhost:8080/");
    let (idle, mut server) = connected_entry("default").await;
    pool.put(k.clone(), idle);

    server.write_all(b"HTTP/1.1 408 Request Timeout\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(pool.claim(&k).is_none());
}

#[test]
fn test_claim_discards_released_transport() {
    let pool = ConnectionPool::new();
    let k = key("http://localhost:8080/");
    pool.put(k.clone(), entry("default"));

    assert!(pool.contains(&k));
    assert!(pool.claim(&k).is_none());
    assert!(!pool.contains(&k));
}

#[test]
fn test_remove_and_clear() {
    let pool = ConnectionPool::new();
    let a = key("http://a.local/");
    let b = key("http://b.local/");
    pool.put(a.clone(), entry("default"));
    pool.put(b.clone(), entry("default"));

    assert!(pool.remove(&a));
    assert!(!pool.remove(&a));
    assert_eq!(pool.len(), 1);

    pool.clear();
    assert!(pool.is_empty());
}
