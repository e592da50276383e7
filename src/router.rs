//! Service routing.
//!
//! Routes are kept in registration order and scanned linearly; the first
//! matching route wins, so a later registration can never shadow an earlier
//! overlapping one.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::request::Request;
use crate::http::response::Response;

/// A request handler run on a worker thread.
///
/// `args` holds the route's capture groups, left to right.
pub trait Service: Send + Sync {
    fn handle(&self, request: &Request, args: &[String]) -> Response;
}

impl<F> Service for F
where
    F: Fn(&Request, &[String]) -> Response + Send + Sync,
{
    fn handle(&self, request: &Request, args: &[String]) -> Response {
        self(request, args)
    }
}

enum Pattern {
    Literal(String),
    Regex(Regex),
}

struct Registration {
    pattern: Pattern,
    service: Arc<dyn Service>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            Pattern::Literal(s) => write!(f, "Literal({s:?})"),
            Pattern::Regex(r) => write!(f, "Regex({:?})", r.as_str()),
        }
    }
}

#[derive(Default, Debug)]
pub struct ServiceRouter {
    routes: Vec<Registration>,
}

impl ServiceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` under `pattern`.
    ///
    /// Literal patterns must start with `/` and match the path exactly.
    /// Regex patterns must match the whole path, ignoring case.
    pub fn add(
        &mut self,
        pattern: &str,
        is_regex: bool,
        service: impl Service + 'static,
    ) -> Result<()> {
        self.add_shared(pattern, is_regex, Arc::new(service))
    }

    pub fn add_shared(
        &mut self,
        pattern: &str,
        is_regex: bool,
        service: Arc<dyn Service>,
    ) -> Result<()> {
        let compiled = if is_regex {
            let anchored = format!("^(?:{pattern})$");
            let regex = RegexBuilder::new(&anchored)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::RoutePattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            Pattern::Regex(regex)
        } else {
            if !pattern.starts_with('/') {
                return Err(Error::RoutePattern {
                    pattern: pattern.to_string(),
                    reason: "literal routes must start with '/'".to_string(),
                });
            }
            Pattern::Literal(pattern.to_string())
        };

        debug!(pattern, is_regex, "Route added");
        self.routes.push(Registration {
            pattern: compiled,
            service,
        });
        Ok(())
    }

    /// Finds the first route matching `path` and returns its service along
    /// with the capture groups. Groups that did not participate in the match
    /// come back as empty strings so positions stay stable.
    pub fn resolve(&self, path: &str) -> Option<(Arc<dyn Service>, Vec<String>)> {
        self.routes.iter().find_map(|route| match &route.pattern {
            Pattern::Literal(literal) => {
                (literal == path).then(|| (route.service.clone(), Vec::new()))
            }
            Pattern::Regex(regex) => regex.captures(path).map(|caps| {
                let args = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                (route.service.clone(), args)
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
