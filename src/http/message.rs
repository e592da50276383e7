//! Shared pieces of the wire message model.
//!
//! [`Request`](crate::http::request::Request) and
//! [`Response`](crate::http::response::Response) differ only in their start
//! line; everything the parser and the writer need is exposed through the
//! [`Message`] trait.

use crate::error::ParseError;

/// Ordered list of header fields.
///
/// Name lookup ignores ASCII case. Setting a name that is already present
/// replaces the earlier value, so the last set wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of the first field matching `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name` to `value`, replacing any existing field with that name.
    ///
    /// The replaced field keeps its position; duplicates after it are dropped.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self
            .fields
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(index) => {
                self.fields[index] = (name, value);
                let mut i = index + 1;
                while i < self.fields.len() {
                    if self.fields[i].0.eq_ignore_ascii_case(&self.fields[index].0) {
                        self.fields.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => self.fields.push((name, value)),
        }
    }

    /// Removes every field named `name` and returns the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let mut removed = None;
        self.fields.retain(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                if removed.is_none() {
                    removed = Some(v.clone());
                }
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.set(k, v);
        }
        headers
    }
}

/// Common view over requests and responses.
pub trait Message: Sized {
    /// Builds an empty message from its start line (without the CRLF).
    fn from_start_line(line: &str) -> Result<Self, ParseError>;

    /// Renders the start line (without the CRLF).
    fn start_line(&self) -> String;

    fn headers(&self) -> &Headers;

    fn headers_mut(&mut self) -> &mut Headers;

    fn body(&self) -> &[u8];

    fn body_mut(&mut self) -> &mut Vec<u8>;

    /// Declared body length; `None` when no Content-Length was seen.
    fn content_length(&self) -> Option<usize>;

    fn set_content_length(&mut self, length: Option<usize>);

    /// False for messages that never carry a body whatever their headers say
    /// (e.g. a 204 response).
    fn may_have_body(&self) -> bool {
        true
    }

    fn is_complete(&self) -> bool {
        match self.content_length() {
            Some(length) => self.body().len() >= length,
            None => false,
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name)
    }

    /// Replaces the body and keeps Content-Length in step with it.
    fn set_body(&mut self, body: Vec<u8>) {
        let length = body.len();
        *self.body_mut() = body;
        self.set_content_length(Some(length));
        self.headers_mut().set("Content-Length", length.to_string());
    }
}

/// Decides whether a connection stays open from the `Connection` header and
/// the protocol version: explicit `close`/`keep-alive` win, otherwise
/// HTTP/1.1 defaults to keep-alive and older versions to close.
pub(crate) fn connection_keep_alive(headers: &Headers, version: &str) -> bool {
    match headers.get("Connection") {
        Some(value) if value.eq_ignore_ascii_case("close") => false,
        Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
        _ => version.eq_ignore_ascii_case("HTTP/1.1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_case_insensitively() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        headers.set("Accept", "*/*");
        headers.set("content-type", "application/json");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.iter().next(), Some(("content-type", "application/json")));
    }

    #[test]
    fn keep_alive_defaults_follow_version() {
        let headers = Headers::new();
        assert!(connection_keep_alive(&headers, "HTTP/1.1"));
        assert!(!connection_keep_alive(&headers, "HTTP/1.0"));

        let headers: Headers = [("Connection", "Close")].into_iter().collect();
        assert!(!connection_keep_alive(&headers, "HTTP/1.1"));
    }
}
