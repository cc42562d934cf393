use super::ServerControl;
use crate::dispatch::{self, DefaultResponder, RequestDispatcher, RequestView, Route};
use crate::http::{HttpConfig, Response};
use crate::{FixtureError, Result};
use http::Method;
use std::fmt;
use std::sync::Arc;

/// Builds a [`FixtureServer`] from routes tried in registration order
///
/// # Examples
///
/// ```
/// use fixturesrv::FixtureServer;
/// use fixturesrv::http::Response;
/// use http::StatusCode;
///
/// let server = FixtureServer::builder()
///     .get_path("/health", |_| Response::text(StatusCode::OK, "ok"))
///     .handle(
///         |request| request.header("x-fail").is_some(),
///         |_| Response::new(StatusCode::INTERNAL_SERVER_ERROR),
///     )
///     .build();
/// assert_eq!(server.routes().len(), 2);
/// ```
#[must_use]
pub struct FixtureServerBuilder {
    routes: Vec<Route>,
    default_responder: DefaultResponder,
    config: HttpConfig,
}

impl Default for FixtureServerBuilder {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            default_responder: dispatch::not_found(),
            config: HttpConfig::default(),
        }
    }
}

impl FixtureServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every GET request
    pub fn get<R>(self, responder: R) -> Self
    where
        R: Fn(&RequestView<'_>) -> Response + Send + Sync + 'static,
    {
        self.handle(|request| request.method() == Method::GET, responder)
    }

    /// Answers GET requests for exactly `path`
    pub fn get_path<R>(self, path: impl Into<String>, responder: R) -> Self
    where
        R: Fn(&RequestView<'_>) -> Response + Send + Sync + 'static,
    {
        let path = path.into();
        self.get_path_matching(move |candidate| candidate == path, responder)
    }

    /// Answers GET requests whose path satisfies `matches`
    pub fn get_path_matching<P, R>(self, matches: P, responder: R) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
        R: Fn(&RequestView<'_>) -> Response + Send + Sync + 'static,
    {
        self.handle(
            move |request| request.method() == Method::GET && matches(request.path()),
            responder,
        )
    }

    /// Answers requests accepted by `predicate`
    pub fn handle<P, R>(mut self, predicate: P, responder: R) -> Self
    where
        P: Fn(&RequestView<'_>) -> bool + Send + Sync + 'static,
        R: Fn(&RequestView<'_>) -> Response + Send + Sync + 'static,
    {
        self.routes
            .push(Route::new(predicate, move |request| Some(responder(request))));
        self
    }

    /// Adds a responder that declines a request by returning `None`
    pub fn respond<R>(mut self, responder: R) -> Self
    where
        R: Fn(&RequestView<'_>) -> Option<Response> + Send + Sync + 'static,
    {
        self.routes.push(Route::responder(responder));
        self
    }

    /// Appends prebuilt routes
    pub fn handle_all(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Replaces the stock 404 for requests no route answers
    pub fn default_responder<R>(mut self, responder: R) -> Self
    where
        R: Fn(&RequestView<'_>) -> Response + Send + Sync + 'static,
    {
        self.default_responder = Arc::new(responder);
        self
    }

    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FixtureServer {
        FixtureServer {
            routes: self.routes,
            default_responder: self.default_responder,
            config: self.config,
        }
    }
}

/// Immutable server definition; each start yields an independent
/// [`ServerControl`] with its own counters and barrier
#[derive(Clone)]
pub struct FixtureServer {
    routes: Vec<Route>,
    default_responder: DefaultResponder,
    config: HttpConfig,
}

impl FixtureServer {
    pub fn builder() -> FixtureServerBuilder {
        FixtureServerBuilder::new()
    }

    /// Starts on an ephemeral port chosen by the operating system.
    pub async fn start_server(&self) -> Result<ServerControl> {
        self.start_with(self.config.clone().with_port(0)).await
    }

    /// Starts on `port`, which must not be 0.
    pub async fn start_server_on(&self, port: u16) -> Result<ServerControl> {
        if port == 0 {
            return Err(FixtureError::InvalidPort(port));
        }
        self.start_with(self.config.clone().with_port(port)).await
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    async fn start_with(&self, config: HttpConfig) -> Result<ServerControl> {
        let dispatcher =
            RequestDispatcher::new(self.routes.iter().cloned(), Arc::clone(&self.default_responder));
        let mut control = ServerControl::new(config, dispatcher);
        control.start().await?;
        Ok(control)
    }
}

impl fmt::Debug for FixtureServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureServer")
            .field("routes", &self.routes.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
