use std::mem;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::http::encoding;
use crate::http::message::Message;
use crate::http::parser::{Parser, Status};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer::MessageWriter;
use crate::server::dispatch::DispatchQueue;
use crate::server::handler::Job;
use crate::transport::{Socket, Transport};

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Hard limit for one request/response cycle; `None` disables it.
    pub deadline: Option<Duration>,
    pub buffer_size: usize,
}

/// One accepted socket, served by a single reactor task.
///
/// Every read and write is issued from that task. Workers only see the
/// [`Job`] and answer through its one-shot channel, so they never touch the
/// socket.
pub struct Connection {
    transport: Transport,
    peer: SocketAddr,
    buffer: Vec<u8>,
    parser: Parser<Request>,
    state: ConnectionState,
    keep_alive: bool,
    /// The request in flight is a HEAD; its response goes out without a body.
    head: bool,
    queue: Arc<DispatchQueue<Job>>,
    settings: ConnectionSettings,
}

pub enum ConnectionState {
    Reading,
    Queued(oneshot::Receiver<Response>),
    Writing(MessageWriter),
    ShuttingDown,
    Closed,
}

impl Connection {
    pub fn new(
        transport: Transport,
        peer: SocketAddr,
        queue: Arc<DispatchQueue<Job>>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            transport,
            peer,
            buffer: vec![0u8; settings.buffer_size.max(1)],
            parser: Parser::new(),
            state: ConnectionState::Reading,
            keep_alive: false,
            head: false,
            queue,
            settings,
        }
    }

    /// Serves request/response cycles until the connection closes.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let keep_alive = match self.settings.deadline {
                Some(deadline) => {
                    let outcome = timeout(deadline, self.serve_one()).await;
                    match outcome {
                        Ok(result) => result?,
                        Err(_) => {
                            // The pending read or write was dropped with the
                            // cycle; close() is idempotent so nothing closes twice.
                            warn!(peer = %self.peer, ?deadline, "Connection deadline expired");
                            self.transport.close();
                            self.state = ConnectionState::Closed;
                            return Ok(());
                        }
                    }
                }
                None => self.serve_one().await?,
            };

            if !keep_alive {
                return Ok(());
            }

            trace!(peer = %self.peer, "Keep-alive, waiting for the next request");
            self.parser.reset();
        }
    }

    /// Runs one cycle. Returns true when the connection stays open for
    /// another request.
    async fn serve_one(&mut self) -> anyhow::Result<bool> {
        self.state = ConnectionState::Reading;

        loop {
            match mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = self.read().await?;
                }

                ConnectionState::Queued(reply) => match reply.await {
                    Ok(response) => {
                        let response = self.finish_response(response);
                        let writer = if self.head {
                            MessageWriter::without_body(&response)
                        } else {
                            MessageWriter::new(&response)
                        };
                        self.state = ConnectionState::Writing(writer);
                    }
                    Err(_) => {
                        debug!(peer = %self.peer, "Request dropped without a response");
                        self.keep_alive = false;
                        self.state = ConnectionState::ShuttingDown;
                    }
                },

                ConnectionState::Writing(writer) => {
                    if let Err(e) = writer.write_to(&mut self.transport).await {
                        self.transport.close();
                        return Err(e.into());
                    }
                    trace!(peer = %self.peer, length = writer.len(), "Response sent");

                    if self.keep_alive {
                        return Ok(true);
                    }
                    self.state = ConnectionState::ShuttingDown;
                }

                ConnectionState::ShuttingDown => {
                    // Close must run even when the shutdown fails.
                    self.transport.shutdown().await;
                    self.transport.close();
                    return Ok(false);
                }

                ConnectionState::Closed => return Ok(false),
            }
        }
    }

    /// Reads and parses until a request is complete, the request is bad, or
    /// the peer goes away.
    async fn read(&mut self) -> anyhow::Result<ConnectionState> {
        let n = match self.transport.read_some(&mut self.buffer).await {
            Ok(n) => n,
            Err(e) => {
                self.transport.close();
                return Err(e.into());
            }
        };

        if n == 0 {
            debug!(peer = %self.peer, "Client closed connection");
            self.transport.close();
            return Ok(ConnectionState::Closed);
        }

        match self.parser.feed(&self.buffer[..n]) {
            Ok(Status::NeedMore) => Ok(ConnectionState::Reading),
            Ok(Status::Complete) => {
                let Some(mut request) = self.parser.take_message() else {
                    return Ok(self.fault(Response::internal_error()));
                };

                if let Err(e) = encoding::decode_body(&mut request) {
                    warn!(peer = %self.peer, error = %e, "Cannot decode request body");
                    return Ok(self.fault(Response::bad_request()));
                }

                debug!(
                    peer = %self.peer,
                    method = request.method.as_str(),
                    target = %request.target,
                    "Request received"
                );

                self.keep_alive = request.keep_alive();
                self.head = request.method == Method::HEAD;
                let (job, reply) = Job::new(request);
                self.queue.enqueue(job);
                Ok(ConnectionState::Queued(reply))
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "Failed to parse request");
                Ok(self.fault(Response::bad_request()))
            }
        }
    }

    /// Answers without involving a worker and closes afterwards.
    fn fault(&mut self, response: Response) -> ConnectionState {
        self.keep_alive = false;
        let response = self.finish_response(response);
        ConnectionState::Writing(MessageWriter::new(&response))
    }

    fn finish_response(&self, mut response: Response) -> Response {
        let connection = if self.keep_alive { "Keep-Alive" } else { "Close" };
        response.headers.set("Connection", connection);
        let length = response.body.len();
        response.set_content_length(Some(length));
        response
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }
}
