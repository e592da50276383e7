use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::reactor::Reactor;
use crate::router::{Service, ServiceRouter};
use crate::server::connection::{Connection, ConnectionSettings};
use crate::server::dispatch::{DispatchQueue, WorkerPool};
use crate::server::handler::{Job, RequestHandler};
use crate::transport::tls::load_acceptor;
use crate::transport::{PlainSocket, TlsSocket, Transport};

/// An HTTP server under construction: configuration plus routes.
pub struct Server {
    config: ServerConfig,
    router: ServiceRouter,
    tls: Option<TlsAcceptor>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: ServiceRouter::new(),
            tls: None,
        }
    }

    /// Registers a service; see [`ServiceRouter::add`].
    pub fn route(
        &mut self,
        pattern: &str,
        is_regex: bool,
        service: impl Service + 'static,
    ) -> crate::Result<()> {
        self.router.add(pattern, is_regex, service)
    }

    /// Serves TLS with the given acceptor instead of plain TCP.
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    /// Binds the listener, starts the workers and the reactor, and returns
    /// immediately.
    pub fn start(self) -> anyhow::Result<ServerHandle> {
        let tls = match (self.tls, &self.config.tls) {
            (Some(acceptor), _) => Some(acceptor),
            (None, Some(files)) => Some(load_acceptor(&files.cert_path, &files.key_path)?),
            (None, None) => None,
        };

        let listener = std::net::TcpListener::bind(&self.config.listen_addr)
            .with_context(|| format!("failed to bind {}", self.config.listen_addr))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let queue = Arc::new(DispatchQueue::new());
        let handler = RequestHandler::new(Arc::new(self.router));
        let workers = WorkerPool::start(self.config.workers, queue.clone(), move |job: Job| {
            handler.handle(job)
        })?;

        let reactor = Reactor::start("weft-server")?;
        let settings = ConnectionSettings {
            deadline: self.config.deadline(),
            buffer_size: self.config.buffer_size,
        };
        let (stop, stopped) = oneshot::channel();
        reactor.spawn(accept_loop(listener, tls, queue, settings, stopped));

        Ok(ServerHandle {
            local_addr,
            stop: Some(stop),
            reactor: Some(reactor),
            workers: Some(workers),
        })
    }

    /// Runs until Ctrl-C.
    pub fn run(self) -> anyhow::Result<()> {
        let handle = self.start()?;

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(tokio::signal::ctrl_c())?;

        info!("Shutdown signal received");
        handle.stop();
        Ok(())
    }
}

/// A running server. Dropping it stops the server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    reactor: Option<Reactor>,
    workers: Option<WorkerPool<Job>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, drops open connections and joins the workers.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        // Dropping the reactor cancels every connection task.
        drop(self.reactor.take());
        if let Some(mut workers) = self.workers.take() {
            workers.stop();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn accept_loop(
    listener: std::net::TcpListener,
    tls: Option<TlsAcceptor>,
    queue: Arc<DispatchQueue<Job>>,
    settings: ConnectionSettings,
    mut stopped: oneshot::Receiver<()>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "Cannot register listener with the reactor");
            return;
        }
    };
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {}", addr);
    }

    loop {
        tokio::select! {
            _ = &mut stopped => {
                info!("Server stopping");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    tokio::spawn(serve(socket, peer, tls.clone(), queue.clone(), settings));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
        }
    }
}

async fn serve(
    socket: TcpStream,
    peer: SocketAddr,
    tls: Option<TlsAcceptor>,
    queue: Arc<DispatchQueue<Job>>,
    settings: ConnectionSettings,
) {
    let transport = match tls {
        Some(acceptor) => {
            let handshake = TlsSocket::accept(&acceptor, socket);
            let accepted = match settings.deadline {
                Some(deadline) => match tokio::time::timeout(deadline, handshake).await {
                    Ok(accepted) => accepted,
                    Err(_) => {
                        warn!(%peer, "TLS handshake timed out");
                        return;
                    }
                },
                None => handshake.await,
            };
            match accepted {
                Ok(socket) => Transport::Tls(socket),
                Err(e) => {
                    warn!(%peer, error = %e, "TLS handshake failed");
                    return;
                }
            }
        }
        None => Transport::Plain(PlainSocket::from_stream(socket)),
    };

    let mut conn = Connection::new(transport, peer, queue, settings);
    if let Err(e) = conn.run().await {
        error!("Connection error from {}: {}", peer, e);
    }
}
