//! Incremental wire-message parser.
//!
//! Bytes may arrive in arbitrary pieces; the parser keeps whatever it could
//! not consume yet and picks up where it left off on the next [`Parser::feed`].

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::error::ParseError;
use crate::http::message::Message;

/// Upper bound on the start line plus headers of one message.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Progress of the parser through one message. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParserState {
    AwaitingStartLine,
    AwaitingHeaders,
    AwaitingBody,
    Done,
}

/// Outcome of a successful [`Parser::feed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NeedMore,
    Complete,
}

pub struct Parser<M: Message> {
    state: ParserState,
    pending: BytesMut,
    /// Bytes of `pending` already searched for a line end.
    scanned: usize,
    /// Head bytes consumed so far.
    head_len: usize,
    message: Option<M>,
    ignore_body: bool,
}

impl<M: Message> Default for Parser<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Parser<M> {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingStartLine,
            pending: BytesMut::new(),
            scanned: 0,
            head_len: 0,
            message: None,
            ignore_body: false,
        }
    }

    /// Completes the message as soon as the headers end, whatever its
    /// Content-Length says. Used for responses to HEAD requests.
    pub fn set_ignore_body(&mut self, ignore: bool) {
        self.ignore_body = ignore;
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Prepares the parser for the next message on the same connection.
    pub fn reset(&mut self) {
        self.state = ParserState::AwaitingStartLine;
        self.pending.clear();
        self.scanned = 0;
        self.head_len = 0;
        self.message = None;
        self.ignore_body = false;
    }

    /// The message parsed so far (available once the start line is read).
    pub fn message(&self) -> Option<&M> {
        self.message.as_ref()
    }

    /// Takes the completed message out of the parser.
    pub fn take_message(&mut self) -> Option<M> {
        if self.state == ParserState::Done {
            self.message.take()
        } else {
            None
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Result<Status, ParseError> {
        if self.state == ParserState::Done {
            if !data.is_empty() {
                warn!(extra = data.len(), "Discarding bytes after a complete message");
            }
            return Ok(Status::Complete);
        }

        self.pending.extend_from_slice(data);

        while matches!(
            self.state,
            ParserState::AwaitingStartLine | ParserState::AwaitingHeaders
        ) {
            let Some(pos) = find_crlf(&self.pending, self.scanned) else {
                if self.head_len + self.pending.len() > MAX_HEAD_BYTES {
                    return Err(ParseError::HeadTooLarge {
                        limit: MAX_HEAD_BYTES,
                    });
                }
                // Keep the last byte: it may be a '\r' whose '\n' is still in flight.
                self.scanned = self.pending.len().saturating_sub(1);
                trace!(pending = self.pending.len(), "Headers continue in next read");
                return Ok(Status::NeedMore);
            };

            self.scanned = 0;
            self.head_len += pos + 2;
            if self.head_len > MAX_HEAD_BYTES {
                return Err(ParseError::HeadTooLarge {
                    limit: MAX_HEAD_BYTES,
                });
            }

            let line = self.pending.split_to(pos + 2);
            let line = &line[..pos];

            match self.state {
                ParserState::AwaitingStartLine => {
                    if line.is_empty() {
                        continue;
                    }
                    let line = std::str::from_utf8(line).map_err(|_| ParseError::StartLine {
                        reason: "start line is not valid UTF-8".to_string(),
                    })?;
                    self.message = Some(M::from_start_line(line)?);
                    self.state = ParserState::AwaitingHeaders;
                }
                _ if line.is_empty() => self.end_headers()?,
                _ => self.header_line(line)?,
            }
        }

        if self.state == ParserState::AwaitingBody {
            self.append_body();
        }

        if self.state == ParserState::Done {
            Ok(Status::Complete)
        } else {
            Ok(Status::NeedMore)
        }
    }

    fn message_mut(&mut self) -> Result<&mut M, ParseError> {
        self.message.as_mut().ok_or_else(|| ParseError::StartLine {
            reason: "header received before the start line".to_string(),
        })
    }

    fn header_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let line = String::from_utf8_lossy(line);

        // Split on the first colon only: values such as dates contain more.
        let Some((name, value)) = line.split_once(':') else {
            warn!(line = %line, "Ignoring malformed header line");
            return Ok(());
        };
        let name = name.trim();
        let value = value.trim();

        let message = self.message_mut()?;

        if name.eq_ignore_ascii_case("Content-Length") {
            let length = value
                .parse::<usize>()
                .map_err(|_| ParseError::ContentLength {
                    reason: format!("unparsable value {value:?}"),
                })?;
            match message.content_length() {
                // Repeating the same value is harmless; disagreeing is not.
                Some(known) if known == length => return Ok(()),
                Some(known) => {
                    return Err(ParseError::ContentLength {
                        reason: format!("conflicting values {known} and {length}"),
                    });
                }
                None => {
                    debug!(content_length = length, "Content length");
                    message.set_content_length(Some(length));
                    message.body_mut().reserve(length.min(64 * 1024));
                }
            }
        }

        message.headers_mut().set(name, value);
        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), ParseError> {
        let ignore_body = self.ignore_body;
        let message = self.message_mut()?;

        if ignore_body || !message.may_have_body() {
            self.state = ParserState::Done;
            return Ok(());
        }

        if message.content_length().is_none() {
            return Err(ParseError::ContentLength {
                reason: "headers ended without a Content-Length".to_string(),
            });
        }

        self.state = ParserState::AwaitingBody;
        Ok(())
    }

    fn append_body(&mut self) {
        let Some(message) = self.message.as_mut() else {
            return;
        };
        let declared = message.content_length().unwrap_or(0);
        let missing = declared.saturating_sub(message.body().len());

        let take = missing.min(self.pending.len());
        message.body_mut().extend_from_slice(&self.pending[..take]);
        self.pending.advance(take);

        if !self.pending.is_empty() {
            warn!(
                extra = self.pending.len(),
                content_length = declared,
                "Body longer than Content-Length, discarding the surplus"
            );
            self.pending.clear();
        }

        if message.is_complete() {
            self.state = ParserState::Done;
        }
    }
}

/// Position of the first CRLF at or after `from`.
fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|pos| pos + from)
}
