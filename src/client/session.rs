//! Client session: builds requests, borrows transports from the pool and
//! drives each exchange on the session's reactor.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::net::lookup_host;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::client::completion::{Completion, Signal};
use crate::client::pool::{ConnectionPool, PoolEntry, PoolKey};
use crate::client::request::{ClientRequest, RequestOptions};
use crate::config::{
    ClientConfig, DEFAULT_BUFFER_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
};
use crate::error::{Error, Result};
use crate::http::encoding::decode_body;
use crate::http::message::Headers;
use crate::http::parser::{Parser, Status};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer::MessageWriter;
use crate::reactor::Reactor;
use crate::transport::tls::DEFAULT_CONTEXT;
use crate::transport::{PlainSocket, Socket, TlsRegistry, TlsSocket, Transport};

/// Settings in effect for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    buffer_size: usize,
    connect_timeout: Duration,
    read_timeout: Duration,
    tls_context: String,
}

impl Settings {
    /// Request override, then session config, then the crate default.
    fn resolve(options: &RequestOptions, config: &ClientConfig) -> Self {
        Self {
            buffer_size: options
                .buffer_size
                .or(config.buffer_size)
                .unwrap_or(DEFAULT_BUFFER_SIZE)
                .max(1),
            connect_timeout: options
                .connect_timeout
                .or(config.connect_timeout())
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: options
                .read_timeout
                .or(config.read_timeout())
                .unwrap_or(DEFAULT_READ_TIMEOUT),
            tls_context: options
                .tls_context
                .clone()
                .or_else(|| config.tls_context.clone())
                .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
        }
    }
}

/// HTTP client bound to a reactor thread.
///
/// Sessions are cheap to create around shared parts: the reactor, the pool
/// and the TLS registry can all be handed to several sessions.
pub struct ClientSession {
    config: ClientConfig,
    headers: Headers,
    reactor: Arc<Reactor>,
    pool: Arc<ConnectionPool>,
    tls: Arc<TlsRegistry>,
    connects: Arc<AtomicUsize>,
}

impl ClientSession {
    /// A session with its own reactor, pool and TLS registry.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let reactor = Reactor::start("weft-client")?;
        Ok(Self::with_parts(
            config,
            Arc::new(reactor),
            Arc::new(ConnectionPool::new()),
            Arc::new(TlsRegistry::new()),
        ))
    }

    pub fn with_parts(
        config: ClientConfig,
        reactor: Arc<Reactor>,
        pool: Arc<ConnectionPool>,
        tls: Arc<TlsRegistry>,
    ) -> Self {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("weft/{}", env!("CARGO_PKG_VERSION")));

        let headers = [
            ("User-Agent", user_agent.as_str()),
            ("Accept-Encoding", "gzip, deflate"),
            ("Accept", "*/*"),
            ("Connection", "Keep-Alive"),
        ]
        .into_iter()
        .collect();

        Self {
            config,
            headers,
            reactor,
            pool,
            tls,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets a header sent with every request of this session.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn tls(&self) -> &Arc<TlsRegistry> {
        &self.tls
    }

    pub fn reactor(&self) -> &Arc<Reactor> {
        &self.reactor
    }

    /// New transports this session has connected (pool reuse excluded).
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }

    /// The exchange as a future, for callers already running on tokio.
    ///
    /// The exchange itself is spawned on the session's reactor right away,
    /// so the connection it leaves in the pool stays bound to a runtime
    /// that outlives the caller's. The returned future only waits for it.
    pub fn execute(
        &self,
        request: ClientRequest,
    ) -> impl Future<Output = Result<Response>> + Send + 'static {
        let handle = self.reactor.spawn(self.exchange(request));
        async move {
            handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "Exchange task did not complete");
                Err(Error::Cancelled)
            })
        }
    }

    /// Runs the exchange on the reactor and hands the outcome to `callback`
    /// there. The callback must not block.
    pub fn send_async<F>(&self, request: ClientRequest, callback: F)
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let exchange = self.exchange(request);
        self.reactor.spawn(async move {
            callback(exchange.await);
        });
    }

    /// Blocks the calling thread until the exchange finishes.
    pub fn send(&self, request: ClientRequest) -> Result<Response> {
        if self.reactor.is_current() {
            return Err(Error::Io {
                source: io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "blocking send on the reactor thread would deadlock",
                ),
            });
        }

        let completion = Arc::new(Completion::new());
        let signal = Signal::new(Arc::clone(&completion));
        self.send_async(request, move |result| signal.finish(result));
        completion.wait()
    }

    /// Detaches everything one exchange needs from the session.
    fn exchange(
        &self,
        request: ClientRequest,
    ) -> impl Future<Output = Result<Response>> + Send + 'static {
        let exchange = Exchange {
            settings: Settings::resolve(&request.options, &self.config),
            wire: request.to_wire(&self.headers),
            pool: Arc::clone(&self.pool),
            tls: Arc::clone(&self.tls),
            connects: Arc::clone(&self.connects),
        };
        exchange.run(PoolKey::from_url(&request.url))
    }
}

/// Everything one request/response exchange needs, detached from the session.
struct Exchange {
    settings: Settings,
    wire: Request,
    pool: Arc<ConnectionPool>,
    tls: Arc<TlsRegistry>,
    connects: Arc<AtomicUsize>,
}

impl Exchange {
    async fn run(self, key: Result<PoolKey>) -> Result<Response> {
        let key = key?;
        let settings = &self.settings;

        let mut entry = match self.pool.claim(&key) {
            Some(entry) if entry.tls_context == settings.tls_context => entry,
            Some(mut stale) => {
                debug!(key = %key, "Pooled connection uses another TLS context; discarding");
                stale.transport.close();
                self.open(&key).await?
            }
            None => self.open(&key).await?,
        };

        let ignore_body = self.wire.method == Method::HEAD;
        let outcome = round_trip(
            &mut entry.transport,
            &self.wire,
            ignore_body,
            entry.buffer_size,
            settings.read_timeout,
        )
        .await;

        let mut response = match outcome {
            Ok(response) => response,
            Err(e) => {
                warn!(key = %key, error = %e, "Request failed; closing connection");
                entry.transport.close();
                return Err(e);
            }
        };

        if response.keep_alive() {
            self.pool.put(key.clone(), entry);
        } else {
            debug!(key = %key, "Server closes the connection");
            entry.transport.shutdown().await;
            entry.transport.close();
        }

        decode_body(&mut response)?;
        info!(
            key = %key,
            target = %self.wire.target,
            status = response.status.as_u16(),
            "Response received"
        );
        Ok(response)
    }

    /// Resolves and connects a fresh transport within the connect timeout.
    async fn open(&self, key: &PoolKey) -> Result<PoolEntry> {
        let settings = &self.settings;
        let mut transport = if key.scheme == "https" {
            Transport::Tls(TlsSocket::client(self.tls.connector(&settings.tls_context)?))
        } else {
            Transport::Plain(PlainSocket::new())
        };

        // Bracketed IPv6 literals resolve without their brackets.
        let host = key.host.trim_start_matches('[').trim_end_matches(']');

        let connect = async {
            let endpoints: Vec<SocketAddr> = lookup_host((host, key.port))
                .await
                .map_err(|source| Error::HostResolve {
                    host: host.to_string(),
                    source,
                })?
                .collect();
            transport.connect(host, &endpoints).await
        };

        match timeout(settings.connect_timeout, connect).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout {
                    operation: "connect",
                    after: settings.connect_timeout,
                });
            }
        }

        self.connects.fetch_add(1, Ordering::Relaxed);
        info!(key = %key, tls = transport.is_tls(), "Connected");

        Ok(PoolEntry {
            transport,
            buffer_size: settings.buffer_size,
            tls_context: settings.tls_context.clone(),
        })
    }
}

/// Writes `request` and reads until a complete response is parsed.
async fn round_trip(
    transport: &mut Transport,
    request: &Request,
    ignore_body: bool,
    buffer_size: usize,
    read_timeout: Duration,
) -> Result<Response> {
    let writer = MessageWriter::new(request);
    match timeout(read_timeout, writer.write_to(transport)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(Error::Timeout {
                operation: "write",
                after: read_timeout,
            });
        }
    };

    let mut parser = Parser::<Response>::new();
    parser.set_ignore_body(ignore_body);
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = match timeout(read_timeout, transport.read_some(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout {
                    operation: "read",
                    after: read_timeout,
                });
            }
        };

        if n == 0 {
            return Err(Error::read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the response was complete",
            )));
        }

        if parser.feed(&buf[..n])? == Status::Complete {
            return parser.take_message().ok_or_else(|| {
                Error::read(io::Error::other("parser completed without a message"))
            });
        }
    }
}
