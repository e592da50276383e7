use crate::error::ParseError;
use crate::http::message::{Headers, Message, connection_keep_alive};

/// HTTP status codes.
///
/// The named variants are the ones the server produces itself; anything else
/// received from a peer is kept as [`StatusCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 202 Accepted
    Accepted,
    /// 204 No Content
    NoContent,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// Any other numeric status
    Other(u16),
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// ```
    /// # use weft::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::Other(418).as_u16(), 418);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::Accepted => 202,
            StatusCode::NoContent => 204,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::Other(code) => *code,
        }
    }

    /// Maps a numeric code back to a named variant where one exists.
    pub fn from_u16(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            202 => StatusCode::Accepted,
            204 => StatusCode::NoContent,
            304 => StatusCode::NotModified,
            400 => StatusCode::BadRequest,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            500 => StatusCode::InternalServerError,
            501 => StatusCode::NotImplemented,
            503 => StatusCode::ServiceUnavailable,
            other => StatusCode::Other(other),
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::Other(_) => "",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }
}

/// Represents a complete HTTP response, sent by the server or received by the
/// client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    /// Reason phrase from the status line
    pub reason: String,
    pub version: String,
    pub headers: Headers,
    /// Declared body length; `None` until a Content-Length is known.
    pub content_length: Option<usize>,
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// ```
/// # use weft::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// assert_eq!(response.headers.get("Content-Length"), Some("2"));
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Adds or replaces a header.
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

    /// Sets the response body.
    ///
    /// # Arguments
    ///
    /// * `body` - Raw body bytes; Content-Length is set from them on build
    ///
    /// # Returns
    ///
    /// The builder, for chaining.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final Response.
    ///
    /// # Returns
    ///
    /// An HTTP/1.1 response with the status's standard reason phrase and a
    /// Content-Length derived from the body.
    pub fn build(self) -> Response {
        let mut response = Response {
            status: self.status,
            reason: self.status.reason_phrase().to_string(),
            version: "HTTP/1.1".to_string(),
            headers: self.headers,
            content_length: None,
            body: Vec::new(),
        };
        response.set_body(self.body);
        response
    }
}

impl Response {
    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// Creates a bodyless response carrying only a status.
    pub fn status(status: StatusCode) -> Self {
        ResponseBuilder::new(status).build()
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request() -> Self {
        ResponseBuilder::new(StatusCode::BadRequest)
            .body(b"400 Bad Request".to_vec())
            .build()
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NotFound)
            .body(b"404 Not Found".to_vec())
            .build()
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::InternalServerError)
            .body(b"500 Internal Server Error".to_vec())
            .build()
    }

    /// Whether the peer intends to keep the connection open.
    pub fn keep_alive(&self) -> bool {
        connection_keep_alive(&self.headers, &self.version)
    }

    /// Body interpreted as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Message for Response {
    fn from_start_line(line: &str) -> Result<Self, ParseError> {
        let mut parts = line.splitn(3, ' ');

        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(ParseError::StartLine {
                reason: format!("malformed status line {line:?}"),
            });
        }

        let code = parts
            .next()
            .and_then(|s| s.trim().parse::<u16>().ok())
            .filter(|code| (100..1000).contains(code))
            .ok_or_else(|| ParseError::StartLine {
                reason: format!("invalid status code in {line:?}"),
            })?;

        let reason = parts.next().unwrap_or_default().trim().to_string();

        Ok(Response {
            status: StatusCode::from_u16(code),
            reason,
            version: version.to_string(),
            headers: Headers::new(),
            content_length: None,
            body: Vec::new(),
        })
    }

    fn start_line(&self) -> String {
        let reason = if self.reason.is_empty() {
            self.status.reason_phrase()
        } else {
            &self.reason
        };
        format!("{} {} {}", self.version, self.status.as_u16(), reason)
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

    fn may_have_body(&self) -> bool {
        let code = self.status.as_u16();
        !((100..200).contains(&code) || code == 204 || code == 304)
    }
}
