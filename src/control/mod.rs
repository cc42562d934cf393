//! Lifecycle control for a running fixture server
//!
//! [`ServerControl`] ties a [`CompletionBarrier`] and a [`RequestDispatcher`]
//! to an [`HttpEngine`]. Every exchange holds a [`RequestTicket`] from the
//! moment the engine hands over the request until the response has been
//! written, so [`ServerControl::flush`] can wait for in-flight responses.

pub mod builder;


pub use builder::{FixtureServer, FixtureServerBuilder};

use crate::barrier::{CompletionBarrier, RequestTicket};
use crate::dispatch::{RequestDispatcher, RequestView};
use crate::http::encoding;
use crate::http::{HttpConfig, HttpEngine, Response, Session, SessionHandler};
use crate::{FixtureError, Result};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const CONTENT_ENCODING: &str = "Content-Encoding";

/// Whether `response` already declares a content encoding.
///
/// Any non-empty token counts, `identity` included.
pub fn any_content_encoding_specified(response: &Response) -> bool {
    response
        .header_values(CONTENT_ENCODING)
        .flat_map(|value| value.split(','))
        .any(|token| !token.trim().is_empty())
}

/// Session handler installed in the engine by [`ServerControl`]
struct ControlHandler {
    barrier: CompletionBarrier,
    dispatcher: RequestDispatcher,
}

impl SessionHandler for ControlHandler {
    type Guard = RequestTicket;

    fn begin(&self) -> RequestTicket {
        self.barrier.open()
    }

    fn serve(&self, session: &Session) -> Response {
        self.dispatcher.handle(&RequestView::new(session))
    }

    fn use_gzip_when_accepted(&self, response: &Response) -> bool {
        encoding::use_gzip_by_default(response) && !any_content_encoding_specified(response)
    }
}

/// Host and port a started server can be reached at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Handle on one fixture server instance
///
/// Created idle, started once, stopped once. Dropping a started control
/// signals the engine to stop without waiting for it.
pub struct ServerControl {
    engine: HttpEngine<ControlHandler>,
}

impl ServerControl {
    pub fn new(config: HttpConfig, dispatcher: RequestDispatcher) -> Self {
        let handler = ControlHandler {
            barrier: CompletionBarrier::new(),
            dispatcher,
        };
        Self {
            engine: HttpEngine::new(config, handler),
        }
    }

    /// Binds the listener and starts serving.
    pub async fn start(&mut self) -> Result<()> {
        self.engine.start().await?;
        if let Some(addr) = self.engine.local_addr() {
            info!(address = %addr, "Fixture server started");
        }
        Ok(())
    }

    /// Waits until every response that was being served when this call
    /// began has been written out or abandoned.
    ///
    /// Requests arriving after the call do not delay it. The future may be
    /// dropped to stop waiting; wrap it in [`tokio::time::timeout`] for a
    /// bounded wait.
    pub async fn flush(&self) -> Result<()> {
        let barrier = self.running_barrier("flush")?;
        barrier.flush().await;
        Ok(())
    }

    /// [`flush`](Self::flush) that gives up with
    /// [`FixtureError::FlushCancelled`] once `cancel` fires.
    pub async fn flush_or_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        let barrier = self.running_barrier("flush")?;
        barrier.flush_or_cancel(cancel).await?;
        Ok(())
    }

    /// Stops the engine. Only the first call on a started server does
    /// anything; in-flight responses are not flushed first.
    pub async fn stop(&mut self) {
        if !self.engine.is_running() {
            debug!(started = self.engine.was_started(), "Stop ignored");
            return;
        }
        self.engine.stop().await;
        info!(
            heard = self.heard_count(),
            matched = self.matched_count(),
            "Fixture server stopped"
        );
    }

    /// `scheme://localhost:port/` for `http` or `https`
    pub fn base_uri(&self, scheme: &str) -> Result<::http::Uri> {
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(FixtureError::InvalidScheme(scheme.to_string()));
        }
        let address = self.socket_address()?;
        format!("{}://{}/", scheme.to_ascii_lowercase(), address)
            .parse()
            .map_err(|e: ::http::uri::InvalidUri| FixtureError::Config(e.to_string()))
    }

    pub fn socket_address(&self) -> Result<HostAddress> {
        let port = self
            .listening_port()
            .ok_or(FixtureError::NotRunning("resolve an address"))?;
        Ok(HostAddress {
            host: "localhost".to_string(),
            port,
        })
    }

    /// Port the listener is bound to, once started
    pub fn listening_port(&self) -> Option<u16> {
        self.engine.listening_port()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn heard_count(&self) -> u64 {
        self.engine.handler().dispatcher.heard_count()
    }

    pub fn matched_count(&self) -> u64 {
        self.engine.handler().dispatcher.matched_count()
    }

    pub fn barrier(&self) -> &CompletionBarrier {
        &self.engine.handler().barrier
    }

    fn running_barrier(&self, operation: &'static str) -> Result<&CompletionBarrier> {
        if self.engine.is_running() {
            Ok(self.barrier())
        } else {
            Err(FixtureError::NotRunning(operation))
        }
    }
}

impl fmt::Debug for ServerControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerControl")
            .field("port", &self.listening_port())
            .field("running", &self.is_running())
            .field("heard", &self.heard_count())
            .field("matched", &self.matched_count())
            .finish()
    }
}
