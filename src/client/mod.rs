//! HTTP client.
//!
//! [`ClientSession`] offers three ways to run a request: [`send`] blocks the
//! calling thread, [`send_async`] runs a callback on the reactor, and
//! [`execute`] returns a future for code already on tokio. All three share
//! the same pooled transports.
//!
//! [`send`]: ClientSession::send
//! [`send_async`]: ClientSession::send_async
//! [`execute`]: ClientSession::execute

pub mod completion;
pub mod pool;
pub mod request;
pub mod session;

pub use pool::{ConnectionPool, PoolKey};
pub use request::ClientRequest;
pub use session::ClientSession;
