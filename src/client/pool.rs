//! Client connection pool.
//!
//! A request claims an entry exclusively (it leaves the map) and puts it back
//! when it is done, so one transport never serves two requests at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Socket, Transport};

/// Identity under which a transport may be reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl PoolKey {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            host: host.into().to_ascii_lowercase(),
            port,
        }
    }

    /// Derives the key from a URL, filling in the scheme's default port.
    pub fn from_url(url: &Url) -> Result<Self> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(Error::UnsupportedScheme(scheme.to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| Error::UnsupportedScheme(format!("{scheme} (missing host)")))?;
        let port = url
            .port_or_known_default()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });
        Ok(Self::new(scheme, host, port))
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// A reusable transport and the configuration it was opened with.
pub struct PoolEntry {
    pub transport: Transport,
    pub buffer_size: usize,
    pub tls_context: String,
}

#[derive(Default)]
pub struct ConnectionPool {
    entries: Mutex<HashMap<PoolKey, PoolEntry>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the idle entry for `key`, if any. An entry the
    /// peer has closed while it sat idle is discarded instead.
    pub fn claim(&self, key: &PoolKey) -> Option<PoolEntry> {
        let mut entry = self.lock().remove(key)?;
        if entry.transport.peer_closed() {
            entry.transport.close();
            debug!(key = %key, "Pooled connection was closed by the peer");
            return None;
        }
        debug!(key = %key, "Reusing pooled connection");
        Some(entry)
    }

    /// Makes `entry` available for later requests with the same key. An
    /// entry it displaces is closed.
    pub fn put(&self, key: PoolKey, entry: PoolEntry) {
        let displaced = self.lock().insert(key.clone(), entry);
        if let Some(mut old) = displaced {
            old.transport.close();
            debug!(key = %key, "Closed displaced pooled connection");
        }
        debug!(key = %key, "Connection added to pool");
    }

    /// Drops and closes the idle entry for `key`.
    pub fn remove(&self, key: &PoolKey) -> bool {
        let removed = self.lock().remove(key);
        match removed {
            Some(mut entry) => {
                entry.transport.close();
                info!(key = %key, "Connection removed from pool");
                true
            }
            None => false,
        }
    }

    /// Closes every idle connection.
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        if !drained.is_empty() {
            info!(count = drained.len(), "Closing all pooled connections");
        }
        for (_, mut entry) in drained {
            entry.transport.close();
        }
    }

    pub fn contains(&self, key: &PoolKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PoolKey, PoolEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
