//! weft - embeddable HTTP/1.1 transport
//!
//! A server that parses requests on a single reactor thread and runs services
//! on a worker pool, and a client with pooled plain/TLS connections.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod reactor;
pub mod router;
pub mod server;
pub mod transport;

pub use client::{ClientRequest, ClientSession};
pub use error::{Error, ParseError, Result};
pub use http::request::{Method, Request};
pub use http::response::{Response, StatusCode};
pub use router::{Service, ServiceRouter};
pub use server::{Server, ServerHandle};
