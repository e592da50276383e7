use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::http::encoding;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::router::ServiceRouter;

/// A parsed request waiting for a worker, plus the way back to the
/// connection that received it.
pub struct Job {
    pub request: Request,
    reply: oneshot::Sender<Response>,
}

impl Job {
    pub fn new(request: Request) -> (Self, oneshot::Receiver<Response>) {
        let (reply, receiver) = oneshot::channel();
        (Self { request, reply }, receiver)
    }

    /// Hands the response back to the connection's reactor task, which does
    /// the actual write.
    pub fn respond(self, response: Response) {
        if self.reply.send(response).is_err() {
            debug!("Connection went away before its response was ready");
        }
    }
}

/// What a worker does with a dequeued job.
pub struct RequestHandler {
    router: Arc<ServiceRouter>,
}

impl RequestHandler {
    pub fn new(router: Arc<ServiceRouter>) -> Self {
        Self { router }
    }

    pub fn handle(&self, job: Job) {
        let response = self.respond(&job.request);
        job.respond(response);
    }

    /// Routes the request on its decoded path and runs the matching service.
    pub fn respond(&self, request: &Request) -> Response {
        let path = request.decoded_path();
        let Some((service, args)) = self.router.resolve(&path) else {
            warn!(path = %path, "No service matches the URL path");
            return Response::not_found();
        };

        let mut response = match catch_unwind(AssertUnwindSafe(|| service.handle(request, &args))) {
            Ok(response) => response,
            Err(_) => {
                error!(path = %path, "Service panicked");
                return Response::internal_error();
            }
        };

        encoding::compress_response(request, &mut response);

        info!(
            method = request.method.as_str(),
            path = %path,
            status = response.status.as_u16(),
            "Request handled"
        );
        response
    }
}
