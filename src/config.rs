//! Server and client configuration.
//!
//! Both structs deserialize from YAML with every field optional. The server
//! configuration can also be assembled from environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Default receive buffer, matching a typical small read.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Worker threads running services.
    pub workers: usize,
    /// Per request/response cycle; absent means no deadline.
    pub deadline_ms: Option<u64>,
    pub buffer_size: usize,
    pub tls: Option<TlsFiles>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            workers: 2,
            deadline_ms: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            tls: None,
        }
    }
}

impl ServerConfig {
    /// Loads from `WEFT_CONFIG` (a YAML file) if set, then applies the
    /// `WEFT_LISTEN`, `WEFT_WORKERS` and `WEFT_DEADLINE_MS` overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("WEFT_CONFIG") {
            Ok(path) => Self::from_yaml_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("WEFT_LISTEN") {
            cfg.listen_addr = listen_addr;
        }
        if let Ok(workers) = std::env::var("WEFT_WORKERS") {
            cfg.workers = workers
                .parse()
                .with_context(|| format!("WEFT_WORKERS is not a number: {workers:?}"))?;
        }
        if let Ok(deadline) = std::env::var("WEFT_DEADLINE_MS") {
            cfg.deadline_ms = Some(
                deadline
                    .parse()
                    .with_context(|| format!("WEFT_DEADLINE_MS is not a number: {deadline:?}"))?,
            );
        }

        Ok(cfg)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid server configuration")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Session-level client defaults. Unset fields fall back to the crate
/// defaults; per-request options take precedence over both.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub buffer_size: Option<usize>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    /// Name of the TLS context used to verify servers.
    pub tls_context: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid client configuration")
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}
