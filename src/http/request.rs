use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use url::form_urlencoded;

use crate::error::ParseError;
use crate::http::message::{Headers, Message, connection_keep_alive};

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
}

/// A request as it travels on the wire.
///
/// `target` is the request-target of the start line, i.e. the path plus an
/// optional query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub target: String,
    pub version: String,
    pub headers: Headers,
    /// Declared body length; `None` until a Content-Length is known.
    pub content_length: Option<usize>,
    pub body: Vec<u8>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Option<String>,
    headers: Headers,
    body: Vec<u8>,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// Matching is case-sensitive, as method tokens are.
    ///
    /// ```
    /// # use weft::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
        }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            target: None,
            version: None,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Sets the request method.
    ///
    /// # Arguments
    ///
    /// * `method` - The method written on the start line
    ///
    /// # Returns
    ///
    /// The builder, for chaining.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the request-target: a path plus an optional query string.
    ///
    /// # Arguments
    ///
    /// * `target` - Origin-form target such as `/items?page=2`
    ///
    /// # Returns
    ///
    /// The builder, for chaining.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Overrides the protocol version, which defaults to `HTTP/1.1`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a header, replacing any earlier value under the same name.
    ///
    /// # Arguments
    ///
    /// * `key` - Header name (matched case-insensitively)
    /// * `value` - Header value
    ///
    /// # Returns
    ///
    /// The builder, for chaining.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the request. Content-Length always reflects the body.
    ///
    /// # Returns
    ///
    /// The request, or a message naming the missing method or target.
    ///
    /// # Example
    ///
    /// ```
    /// # use weft::http::request::{Method, RequestBuilder};
    /// let request = RequestBuilder::new()
    ///     .method(Method::POST)
    ///     .target("/submit")
    ///     .body("hello")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.headers.get("Content-Length"), Some("5"));
    ///
    /// assert!(RequestBuilder::new().target("/").build().is_err());
    /// ```
    pub fn build(self) -> Result<Request, &'static str> {
        let mut request = Request {
            method: self.method.ok_or("method missing")?,
            target: self.target.ok_or("target missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            content_length: None,
            body: Vec::new(),
        };
        request.set_body(self.body);
        Ok(request)
    }
}

impl Request {
    /// The path component of the target, without the query string. Still
    /// percent-encoded; see [`decoded_path`](Self::decoded_path).
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The path with percent-escapes decoded. Routing matches against this.
    ///
    /// Invalid UTF-8 after decoding is replaced rather than rejected. A `+`
    /// stays a `+`: only query strings use it for spaces.
    ///
    /// # Example
    ///
    /// ```
    /// # use weft::http::request::{Method, RequestBuilder};
    /// let request = RequestBuilder::new()
    ///     .method(Method::GET)
    ///     .target("/files/a%20b+c?x=1")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.decoded_path(), "/files/a b+c");
    /// ```
    pub fn decoded_path(&self) -> Cow<'_, str> {
        percent_decode_str(self.path()).decode_utf8_lossy()
    }

    /// The raw query string, if the target has one.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// Decodes the query string as `application/x-www-form-urlencoded` pairs.
    ///
    /// # Returns
    ///
    /// The pairs in the order they appear, repeated names included. Empty
    /// when the target has no query.
    ///
    /// # Example
    ///
    /// ```
    /// # use weft::http::request::{Method, RequestBuilder};
    /// let request = RequestBuilder::new()
    ///     .method(Method::GET)
    ///     .target("/search?q=a+b&path=%2Ftmp&flag")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(
    ///     request.query_pairs(),
    ///     vec![
    ///         ("q".to_string(), "a b".to_string()),
    ///         ("path".to_string(), "/tmp".to_string()),
    ///         ("flag".to_string(), String::new()),
    ///     ]
    /// );
    /// ```
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query()
            .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// # Returns
    ///
    /// What an explicit `Connection: close` or `Connection: keep-alive` says;
    /// without one, `true` for HTTP/1.1 only.
    ///
    /// # Example
    ///
    /// ```
    /// # use weft::http::request::{Method, RequestBuilder};
    /// let request = RequestBuilder::new()
    ///     .method(Method::GET)
    ///     .target("/")
    ///     .header("Connection", "close")
    ///     .build()
    ///     .unwrap();
    /// assert!(!request.keep_alive());
    /// ```
    pub fn keep_alive(&self) -> bool {
        connection_keep_alive(&self.headers, &self.version)
    }

    /// Whether the client advertised gzip in `Accept-Encoding`.
    ///
    /// # Returns
    ///
    /// `true` if any listed coding starts with `gzip`, in any letter case.
    ///
    /// # Example
    ///
    /// ```
    /// # use weft::http::request::{Method, RequestBuilder};
    /// let request = RequestBuilder::new()
    ///     .method(Method::GET)
    ///     .target("/")
    ///     .header("Accept-Encoding", "deflate, GZIP;q=0.8")
    ///     .build()
    ///     .unwrap();
    /// assert!(request.accepts_gzip());
    /// ```
    pub fn accepts_gzip(&self) -> bool {
        self.headers
            .get("Accept-Encoding")
            .map(|v| {
                v.split(',')
                    .any(|coding| coding.trim().to_ascii_lowercase().starts_with("gzip"))
            })
            .unwrap_or(false)
    }
}

impl Message for Request {
    fn from_start_line(line: &str) -> Result<Self, ParseError> {
        let mut parts = line.split_whitespace();

        let method_str = parts.next().ok_or_else(|| ParseError::StartLine {
            reason: "empty request line".to_string(),
        })?;
        let target = parts.next().ok_or_else(|| ParseError::StartLine {
            reason: format!("missing request target in {line:?}"),
        })?;
        let version = parts.next().ok_or_else(|| ParseError::StartLine {
            reason: format!("missing version in {line:?}"),
        })?;

        if parts.next().is_some() || !version.starts_with("HTTP/") {
            return Err(ParseError::StartLine {
                reason: format!("malformed request line {line:?}"),
            });
        }

        let method = Method::from_str(method_str).ok_or_else(|| ParseError::StartLine {
            reason: format!("unknown method {method_str:?}"),
        })?;

        Ok(Request {
            method,
            target: target.to_string(),
            version: version.to_string(),
            headers: Headers::new(),
            content_length: None,
            body: Vec::new(),
        })
    }

    fn start_line(&self) -> String {
        format!("{} {} {}", self.method.as_str(), self.target, self.version)
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    fn set_content_length(&mut self, length: Option<usize>) {
        self.content_length = length;
    }
}
