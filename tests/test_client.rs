use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use weft::config::{ClientConfig, ServerConfig};
use weft::http::response::{Response, StatusCode};
use weft::{ClientRequest, ClientSession, Error, Request, Server, ServerHandle};

fn test_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        workers: 4,
        ..ServerConfig::default()
    }
}

fn start_server() -> ServerHandle {
    start_server_with(test_config())
}

fn start_server_with(config: ServerConfig) -> ServerHandle {
    let mut server = Server::new(config);
    server
        .route("/hello", false, |_: &Request, _: &[String]| {
            Response::ok("hello")
        })
        .unwrap();
    server
        .route("/echo/(\\w+)", true, |request: &Request, args: &[String]| {
            let body = String::from_utf8_lossy(&request.body);
            Response::ok(format!("{}:{}", args[0], body))
        })
        .unwrap();
    server
        .route("/slow", false, |_: &Request, _: &[String]| {
            thread::sleep(Duration::from_millis(500));
            Response::ok("late")
        })
        .unwrap();
    server
        .route("/slow-echo/(\\w+)", true, |_: &Request, args: &[String]| {
            thread::sleep(Duration::from_millis(50));
            Response::ok(args[0].clone())
        })
        .unwrap();
    server
        .route("/large", false, |_: &Request, _: &[String]| {
            Response::ok("weft ".repeat(2000))
        })
        .unwrap();
    server.start().unwrap()
}

fn url(handle: &ServerHandle, path: &str) -> String {
    format!("http://{}{}", handle.local_addr(), path)
}

fn session() -> ClientSession {
    ClientSession::new(ClientConfig::default()).unwrap()
}

/// Reads one request head (these tests never send a body).
fn read_head(stream: &mut TcpStream) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).unwrap() == 0 {
            return;
        }
        head.push(byte[0]);
    }
}

/// Answers one request on the first connection, then drops that connection
/// as soon as the next request arrives on it. The second connection gets a
/// normal answer.
fn drop_second_request_server() -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let (mut first, _) = listener.accept().unwrap();
        read_head(&mut first);
        first
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nfirst")
            .unwrap();
        read_head(&mut first);
        drop(first);

        let (mut second, _) = listener.accept().unwrap();
        read_head(&mut second);
        second
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\nsecond")
            .unwrap();
    });
    (base, server)
}

#[test]
fn test_blocking_get() {
    let server = start_server();
    let client = session();

    let response = client
        .send(ClientRequest::get(&url(&server, "/hello")).unwrap())
        .unwrap();

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.text(), "hello");
}

#[test]
fn test_post_body_reaches_service() {
    let server = start_server();
    let client = session();

    let request = ClientRequest::post(&url(&server, "/echo/item"))
        .unwrap()
        .header("Content-Type", "text/plain")
        .body("payload");
    let response = client.send(request).unwrap();

    assert_eq!(response.text(), "item:payload");
}

#[test]
fn test_pool_reuses_connection() {
    let server = start_server();
    let client = session();

    for _ in 0..3 {
        let response = client
            .send(ClientRequest::get(&url(&server, "/hello")).unwrap())
            .unwrap();
        assert_eq!(response.text(), "hello");
    }

    assert_eq!(client.connect_count(), 1);
    assert_eq!(client.pool().len(), 1);
}

#[test]
fn test_connection_close_evicts_from_pool() {
    let server = start_server();
    let client = session();

    let request = ClientRequest::get(&url(&server, "/hello"))
        .unwrap()
        .header("Connection", "close");
    let response = client.send(request).unwrap();

    assert!(!response.keep_alive());
    assert!(client.pool().is_empty());

    client
        .send(ClientRequest::get(&url(&server, "/hello")).unwrap())
        .unwrap();
    assert_eq!(client.connect_count(), 2);
}

#[test]
fn test_head_request_leaves_connection_usable() {
    let server = start_server();
    let client = session();

    let response = client
        .send(ClientRequest::head(&url(&server, "/hello")).unwrap())
        .unwrap();
    assert_eq!(response.status, StatusCode::Ok);
    assert!(response.body.is_empty());

    let response = client
        .send(ClientRequest::get(&url(&server, "/hello")).unwrap())
        .unwrap();
    assert_eq!(response.text(), "hello");
    assert_eq!(client.connect_count(), 1);
}

#[test]
fn test_gzip_response_is_decoded() {
    let server = start_server();
    let client = session();

    let response = client
        .send(ClientRequest::get(&url(&server, "/large")).unwrap())
        .unwrap();

    assert_eq!(response.text(), "weft ".repeat(2000));
    assert!(response.headers.get("Content-Encoding").is_none());
}

#[test]
fn test_read_timeout_is_reported_as_timeout() {
    let server = start_server();
    let client = session();

    let request = ClientRequest::get(&url(&server, "/slow"))
        .unwrap()
        .read_timeout(Duration::from_millis(100));
    let err = client.send(request).unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(client.pool().is_empty());
}

#[test]
fn test_refused_connection_is_not_a_timeout() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = session();

    let err = client
        .send(ClientRequest::get(&format!("http://127.0.0.1:{port}/")).unwrap())
        .unwrap_err();

    assert!(matches!(err, Error::EndpointConnect { .. }), "{err}");
    assert!(!err.is_timeout());
    assert_eq!(client.connect_count(), 0);
}

#[test]
fn test_unsupported_scheme() {
    let client = session();
    let err = client
        .send(ClientRequest::get("ftp://127.0.0.1/file").unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedScheme(_)));
}

#[test]
fn test_tls_handshake_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let garbage = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        thread::sleep(Duration::from_millis(200));
    });

    let client = session();
    let err = client
        .send(ClientRequest::get(&format!("https://{addr}/")).unwrap())
        .unwrap_err();

    assert!(matches!(err, Error::Tls { .. }), "{err}");
    assert!(client.pool().is_empty());
    garbage.join().unwrap();
}

#[test]
fn test_unknown_tls_context_is_rejected() {
    let client = session();
    let request = ClientRequest::get("https://127.0.0.1:1/")
        .unwrap()
        .tls_context("missing");

    assert!(matches!(client.send(request), Err(Error::Tls { .. })));
    assert_eq!(client.connect_count(), 0);
}

#[test]
fn test_send_async_runs_callback() {
    let server = start_server();
    let client = session();
    let (tx, rx) = mpsc::channel();

    client.send_async(
        ClientRequest::get(&url(&server, "/hello")).unwrap(),
        move |result| {
            let _ = tx.send(result.map(|response| response.text()));
        },
    );

    let text = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(text, "hello");
}

#[test]
fn test_connection_closed_by_server_deadline_is_replaced() {
    let server = start_server_with(ServerConfig {
        deadline_ms: Some(200),
        ..test_config()
    });
    let client = session();

    let response = client
        .send(ClientRequest::get(&url(&server, "/hello")).unwrap())
        .unwrap();
    assert_eq!(response.text(), "hello");
    assert_eq!(client.pool().len(), 1);

    // Longer than the deadline: the server closes the idle connection.
    thread::sleep(Duration::from_millis(500));

    let response = client
        .send(ClientRequest::get(&url(&server, "/hello")).unwrap())
        .unwrap();
    assert_eq!(response.text(), "hello");
    assert_eq!(client.connect_count(), 2);
}

#[test]
fn test_lost_pooled_connection_is_reported_not_retried() {
    let (base, server) = drop_second_request_server();
    let client = session();

    let first = client
        .send(ClientRequest::get(&format!("{base}/a")).unwrap())
        .unwrap();
    assert_eq!(first.text(), "first");

    // The connection still looks healthy when claimed; the server drops it
    // only once the request is on the wire.
    let err = client
        .send(ClientRequest::get(&format!("{base}/b")).unwrap())
        .unwrap_err();
    assert!(err.is_connection_lost(), "{err}");
    assert!(!err.is_timeout());
    assert_eq!(client.connect_count(), 1);
    assert!(client.pool().is_empty());

    // The next request starts over on a new connection.
    let third = client
        .send(ClientRequest::get(&format!("{base}/c")).unwrap())
        .unwrap();
    assert_eq!(third.text(), "second");
    assert_eq!(client.connect_count(), 2);
    server.join().unwrap();
}

#[test]
fn test_pooled_connection_outlives_caller_runtime() {
    let server = start_server();
    let client = session();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let response = runtime
        .block_on(client.execute(ClientRequest::get(&url(&server, "/hello")).unwrap()))
        .unwrap();
    assert_eq!(response.text(), "hello");
    drop(runtime);

    assert_eq!(client.pool().len(), 1);
    let response = client
        .send(ClientRequest::get(&url(&server, "/hello")).unwrap())
        .unwrap();
    assert_eq!(response.text(), "hello");
    assert_eq!(client.connect_count(), 1);
}

#[tokio::test]
async fn test_execute_inside_tokio() {
    let server = start_server();
    let client = session();

    let response = client
        .execute(ClientRequest::get(&url(&server, "/echo/async")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.text(), "async:");
}

#[test]
fn test_concurrent_sessions_are_isolated() {
    // Fewer workers than client threads, and a handler slow enough that
    // requests from every thread queue up behind each other.
    let server = Arc::new(start_server_with(ServerConfig {
        workers: 2,
        ..test_config()
    }));

    let threads: Vec<_> = (0..8)
        .map(|id| {
            let server = server.clone();
            thread::spawn(move || {
                let client = session();
                for round in 0..5 {
                    let word = format!("t{id}r{round}");
                    let request =
                        ClientRequest::get(&url(&server, &format!("/slow-echo/{word}"))).unwrap();
                    let response = client.send(request).unwrap();
                    assert_eq!(response.text(), word);
                }
                client.connect_count()
            })
        })
        .collect();

    for thread in threads {
        assert_eq!(thread.join().unwrap(), 1);
    }
}

#[test]
fn test_concurrent_timeouts_do_not_cross_responses() {
    let server = Arc::new(start_server_with(ServerConfig {
        workers: 2,
        ..test_config()
    }));

    let threads: Vec<_> = (0..8)
        .map(|id| {
            let server = server.clone();
            thread::spawn(move || {
                let client = session();
                for round in 0..4 {
                    let word = format!("t{id}r{round}");
                    let request =
                        ClientRequest::get(&url(&server, &format!("/slow-echo/{word}"))).unwrap();
                    if round % 2 == 1 {
                        // The handler alone takes longer than this.
                        let request = request.read_timeout(Duration::from_millis(20));
                        let err = client.send(request).unwrap_err();
                        assert!(err.is_timeout(), "unexpected error: {err}");
                        assert!(client.pool().is_empty());
                    } else {
                        let response = client.send(request).unwrap();
                        assert_eq!(response.text(), word);
                    }
                }
                client.connect_count()
            })
        })
        .collect();

    // Each timeout discards the connection, so the next round reconnects.
    for thread in threads {
        assert_eq!(thread.join().unwrap(), 2);
    }
}

#[test]
fn test_session_headers_are_sent() {
    let server = start_server();
    let mut client = session();
    client.set_header("X-Api-Key", "secret");

    assert_eq!(client.headers().get("X-Api-Key"), Some("secret"));
    assert_eq!(client.headers().get("Accept"), Some("*/*"));
    assert!(client.headers().get("User-Agent").unwrap().starts_with("weft/"));

    let response = client
        .send(ClientRequest::get(&url(&server, "/hello")).unwrap())
        .unwrap();
    assert_eq!(response.status, StatusCode::Ok);
}
