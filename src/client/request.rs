use std::time::Duration;

use url::Url;

use crate::error::Result;
use crate::http::message::{Headers, Message};
use crate::http::request::{Method, Request};

/// Per-request overrides of the session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub buffer_size: Option<usize>,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub tls_context: Option<String>,
}

/// A request addressed by absolute URL, before it is bound to a connection.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub options: RequestOptions,
}

impl ClientRequest {
    pub fn new(method: Method, url: &str) -> Result<Self> {
        Ok(Self {
            method,
            url: Url::parse(url)?,
            headers: Headers::new(),
            body: Vec::new(),
            options: RequestOptions::default(),
        })
    }

    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::GET, url)
    }

    pub fn head(url: &str) -> Result<Self> {
        Self::new(Method::HEAD, url)
    }

    pub fn post(url: &str) -> Result<Self> {
        Self::new(Method::POST, url)
    }

    pub fn put(url: &str) -> Result<Self> {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: &str) -> Result<Self> {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: &str) -> Result<Self> {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.options.buffer_size = Some(size);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = Some(timeout);
        self
    }

    pub fn tls_context(mut self, key: impl Into<String>) -> Self {
        self.options.tls_context = Some(key.into());
        self
    }

    /// Origin-form target: path plus query.
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// Builds the wire request. Session headers come first and request
    /// headers override them on collision; Host comes from the URL unless
    /// the request sets it.
    pub fn to_wire(&self, session_headers: &Headers) -> Request {
        let mut headers = session_headers.clone();
        for (name, value) in self.headers.iter() {
            headers.set(name, value);
        }

        if !headers.contains("Host") {
            let host = self.url.host_str().unwrap_or_default();
            let host = match self.url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            headers.set("Host", host);
        }

        let mut request = Request {
            method: self.method,
            target: self.target(),
            version: "HTTP/1.1".to_string(),
            headers,
            content_length: None,
            body: Vec::new(),
        };
        request.set_body(self.body.clone());
        request
    }
}
