//! Ordered request dispatching
//!
//! A [`RequestDispatcher`] holds an ordered list of [`Route`]s, each a
//! predicate paired with a responder, plus a default responder. The first
//! route that accepts a request and produces a response wins.

pub mod request;

#[cfg(test)]
mod tests;

pub use request::RequestView;

use crate::http::Response;
use http::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub type Predicate = Arc<dyn Fn(&RequestView<'_>) -> bool + Send + Sync>;
pub type Responder = Arc<dyn Fn(&RequestView<'_>) -> Option<Response> + Send + Sync>;
pub type DefaultResponder = Arc<dyn Fn(&RequestView<'_>) -> Response + Send + Sync>;

const NOT_FOUND_MIME_TYPE: &str = "text/plain; charset=us-ascii";
const NOT_FOUND_BODY: &[u8] = b"404 Not Found";

/// A predicate and the responder it guards
#[derive(Clone)]
pub struct Route {
    predicate: Predicate,
    responder: Responder,
}

impl Route {
    pub fn new<P, R>(predicate: P, responder: R) -> Self
    where
        P: Fn(&RequestView<'_>) -> bool + Send + Sync + 'static,
        R: Fn(&RequestView<'_>) -> Option<Response> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            responder: Arc::new(responder),
        }
    }

    /// A route with no predicate; the responder decides by returning `None`.
    pub fn responder<R>(responder: R) -> Self
    where
        R: Fn(&RequestView<'_>) -> Option<Response> + Send + Sync + 'static,
    {
        Self::new(|_| true, responder)
    }

    fn respond(&self, request: &RequestView<'_>) -> Option<Response> {
        if (self.predicate)(request) {
            (self.responder)(request)
        } else {
            None
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").finish_non_exhaustive()
    }
}

/// First-match-wins request dispatcher with observability counters
pub struct RequestDispatcher {
    routes: Vec<Route>,
    default_responder: DefaultResponder,
    heard: AtomicU64,
    matched: AtomicU64,
}

impl RequestDispatcher {
    pub fn new(routes: impl IntoIterator<Item = Route>, default_responder: DefaultResponder) -> Self {
        Self {
            routes: routes.into_iter().collect(),
            default_responder,
            heard: AtomicU64::new(0),
            matched: AtomicU64::new(0),
        }
    }

    /// Dispatcher that answers everything with [`not_found_response`]
    pub fn with_routes(routes: impl IntoIterator<Item = Route>) -> Self {
        Self::new(routes, not_found())
    }

    /// Picks the response for `request`.
    ///
    /// Every call counts as heard. Routes are tried in order; the first one
    /// whose predicate accepts and whose responder answers counts as a
    /// match. Otherwise the default responder answers and nothing counts as
    /// matched.
    pub fn handle(&self, request: &RequestView<'_>) -> Response {
        self.heard.fetch_add(1, Ordering::Relaxed);

        for route in &self.routes {
            if let Some(response) = route.respond(request) {
                self.matched.fetch_add(1, Ordering::Relaxed);
                return response;
            }
        }

        (self.default_responder)(request)
    }

    pub fn heard_count(&self) -> u64 {
        self.heard.load(Ordering::Relaxed)
    }

    pub fn matched_count(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("routes", &self.routes.len())
            .field("heard", &self.heard_count())
            .field("matched", &self.matched_count())
            .finish()
    }
}

/// The stock 404 response; identical on every call
pub fn not_found_response() -> Response {
    Response::fixed_length(StatusCode::NOT_FOUND, NOT_FOUND_MIME_TYPE, NOT_FOUND_BODY)
}

/// Default responder that logs the miss and answers [`not_found_response`]
pub fn not_found() -> DefaultResponder {
    Arc::new(|request: &RequestView<'_>| {
        let query = request.session().query_string().unwrap_or_default();
        debug!(
            target: "fixturesrv::dispatch::default",
            "404 {} {}",
            request.path(),
            abbreviate(query, 128)
        );
        not_found_response()
    })
}

/// Shortens `text` to at most `max_chars` characters, ending in "..." when cut.
fn abbreviate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}
