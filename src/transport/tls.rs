//! TLS transport and certificate contexts.
//!
//! Peer verification is always on. Callers choose *what* to trust by naming a
//! certificate context registered in a [`TlsRegistry`]; the `"default"`
//! context trusts the bundled web PKI roots.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector, TlsStream};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::Socket;
use crate::transport::plain::{Idle, connect_tcp, idle_state};

/// Key of the context every registry starts with.
pub const DEFAULT_CONTEXT: &str = "default";

/// Named client certificate contexts.
pub struct TlsRegistry {
    contexts: RwLock<HashMap<String, Arc<ClientConfig>>>,
}

impl Default for TlsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsRegistry {
    pub fn new() -> Self {
        let mut contexts = HashMap::new();
        contexts.insert(
            DEFAULT_CONTEXT.to_string(),
            client_config(default_roots()),
        );
        Self {
            contexts: RwLock::new(contexts),
        }
    }

    /// Registers (or replaces) a fully custom client configuration.
    pub fn register(&self, key: impl Into<String>, config: Arc<ClientConfig>) {
        let key = key.into();
        debug!(context = %key, "Registered TLS context");
        self.contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, config);
    }

    /// Registers a context trusting the PEM certificates in `pem`.
    ///
    /// With `include_default_roots` the certificates are added on top of the
    /// web PKI roots (pinning a private CA for some hosts); without it they
    /// replace the trust store entirely. Returns the number of certificates
    /// added.
    pub fn register_pem(
        &self,
        key: impl Into<String>,
        pem: &[u8],
        include_default_roots: bool,
    ) -> Result<usize> {
        let mut roots = if include_default_roots {
            default_roots()
        } else {
            RootCertStore::empty()
        };

        let certs = rustls_pemfile::certs(&mut &pem[..])
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| Error::tls(format!("invalid PEM data: {e}")))?;
        if certs.is_empty() {
            return Err(Error::tls("no certificate found in PEM data"));
        }

        let count = certs.len();
        for cert in certs {
            roots
                .add(cert)
                .map_err(|e| Error::tls(format!("unusable certificate: {e}")))?;
        }

        self.register(key, client_config(roots));
        Ok(count)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn connector(&self, key: &str) -> Result<TlsConnector> {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .map(TlsConnector::from)
            .ok_or_else(|| Error::tls(format!("unknown TLS context {key:?}")))
    }
}

fn default_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

fn client_config(roots: RootCertStore) -> Arc<ClientConfig> {
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

/// Builds a server-side acceptor from PEM certificate chain and key files.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    if !cert_path.exists() {
        return Err(Error::tls(format!(
            "certificate file not found: {}",
            cert_path.display()
        )));
    }
    if !key_path.exists() {
        return Err(Error::tls(format!(
            "private key file not found: {}",
            key_path.display()
        )));
    }

    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
        .collect::<io::Result<Vec<_>>>()?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?
        .ok_or_else(|| Error::tls(format!("no private key in {}", key_path.display())))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::tls(format!("invalid certificate/key pair: {e}")))?;

    info!(cert = %cert_path.display(), "Loaded TLS certificate");
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// TLS over TCP, client or server side.
pub struct TlsSocket {
    connector: Option<TlsConnector>,
    stream: Option<TlsStream<TcpStream>>,
}

impl TlsSocket {
    /// An unconnected client socket verifying peers with `connector`.
    pub fn client(connector: TlsConnector) -> Self {
        Self {
            connector: Some(connector),
            stream: None,
        }
    }

    /// Completes the server-side handshake on an accepted stream.
    pub async fn accept(acceptor: &TlsAcceptor, stream: TcpStream) -> Result<Self> {
        let stream = acceptor
            .accept(stream)
            .await
            .map_err(|e| Error::tls(format!("handshake failed: {e}")))?;
        Ok(Self {
            connector: None,
            stream: Some(TlsStream::Server(stream)),
        })
    }

    fn stream(&mut self) -> io::Result<&mut TlsStream<TcpStream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket is closed"))
    }
}

impl Socket for TlsSocket {
    async fn connect(&mut self, host: &str, endpoints: &[SocketAddr]) -> Result<()> {
        let connector = self
            .connector
            .clone()
            .ok_or_else(|| Error::tls("accepted socket cannot connect"))?;

        // SNI carries the host so the server can pick the right certificate.
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| Error::tls(format!("invalid server name {host:?}: {e}")))?;

        let tcp = connect_tcp(host, endpoints).await?;
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::tls(format!("handshake with {host} failed: {e}")))?;

        debug!(host, "TLS handshake completed");
        self.stream = Some(TlsStream::Client(stream));
        Ok(())
    }

    async fn write(&mut self, buffers: &[&[u8]]) -> Result<usize> {
        let stream = self.stream().map_err(Error::write)?;
        let mut written = 0;
        for buf in buffers {
            stream.write_all(buf).await.map_err(Error::write)?;
            written += buf.len();
        }
        stream.flush().await.map_err(Error::write)?;
        Ok(written)
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream().map_err(Error::read)?;
        match stream.read(buf).await {
            Ok(n) => Ok(n),
            // Peers often drop the TCP connection without close_notify.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(Error::read(e)),
        }
    }

    async fn shutdown(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        // Sends close_notify, then shuts down the TCP write half.
        match stream.shutdown().await {
            Ok(()) => true,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotConnected
                        | io::ErrorKind::BrokenPipe
                        | io::ErrorKind::UnexpectedEof
                ) =>
            {
                true
            }
            Err(e) => {
                warn!(error = %e, "TLS shutdown error");
                false
            }
        }
    }

    fn close(&mut self) -> bool {
        self.stream.take().is_some()
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Pending records on an idle TLS connection may be session tickets, so
    /// only a closed TCP stream counts here.
    fn peer_closed(&self) -> bool {
        match &self.stream {
            Some(stream) => idle_state(stream.get_ref().0) == Idle::Closed,
            None => true,
        }
    }
}
