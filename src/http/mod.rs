//! HTTP/1.x wire protocol.
//!
//! This module holds everything that is independent of sockets: the message
//! model, the incremental parser, serialization and content encodings. Both
//! the server and the client build on it.
//!
//! # Architecture
//!
//! - **`message`**: Ordered headers and the [`Message`](message::Message) trait
//!   shared by requests and responses
//! - **`request`**: Request start line, method and builder
//! - **`response`**: Status codes, response start line and builder
//! - **`parser`**: Restartable parser fed with arbitrary byte chunks
//! - **`writer`**: Serializes a message and writes it through a transport
//! - **`encoding`**: gzip/deflate helpers
//!
//! # Parser states
//!
//! ```text
//!   AwaitingStartLine ──► AwaitingHeaders ──► AwaitingBody ──► Done
//!          │                    │                  │ ▲
//!          │ bad start line     │ no length        └─┘ NeedMore until
//!          ▼                    ▼                      Content-Length bytes
//!       StartLine          ContentLength
//! ```
//!
//! # Example
//!
//! ```
//! use weft::http::parser::{Parser, Status};
//! use weft::http::request::Request;
//!
//! let mut parser = Parser::<Request>::new();
//! assert_eq!(parser.feed(b"GET / HTTP/1.1\r\nContent-Len").unwrap(), Status::NeedMore);
//! assert_eq!(parser.feed(b"gth: 0\r\n\r\n").unwrap(), Status::Complete);
//! assert_eq!(parser.take_message().unwrap().path(), "/");
//! ```

pub mod encoding;
pub mod message;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
