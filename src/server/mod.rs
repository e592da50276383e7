//! HTTP server.
//!
//! # Request flow
//!
//! ```text
//!  reactor thread                         worker threads
//!  ──────────────                         ──────────────
//!  accept ─► Connection::run
//!              Reading ◄──────┐
//!                │ parse      │ NeedMore
//!                ├────────────┘
//!                │ Complete            DispatchQueue
//!                ▼                    ┌──────────────┐
//!              Queued ───── Job ────► │ route+handle │
//!                ▲                    └──────┬───────┘
//!                └──── oneshot reply ────────┘
//!              Writing
//!                ├─ keep-alive ─► Reading
//!                └─ close ──────► ShuttingDown ─► Closed
//! ```
//!
//! A parse error skips the queue and writes a 400 straight away.

pub mod connection;
pub mod dispatch;
pub mod handler;
pub mod listener;

pub use listener::{Server, ServerHandle};
