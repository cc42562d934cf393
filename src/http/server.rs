use super::config::HttpConfig;
use super::encoding::{self, GZIP};
use super::protocol::{HttpConnection, HttpProtocolError};
use super::{Response, Session};
use crate::limits::ConnectionLimiter;
use crate::{FixtureError, Result};
use http::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn, Instrument};

/// Answers sessions on behalf of an [`HttpEngine`]
///
/// For every request the engine calls [`begin`](Self::begin), then
/// [`serve`](Self::serve), then writes the response. The guard returned by
/// `begin` is dropped once writing has finished or failed, including when
/// the connection task is aborted.
pub trait SessionHandler: Send + Sync + 'static {
    /// Held for the duration of one exchange
    type Guard: Send + 'static;

    fn begin(&self) -> Self::Guard;

    fn serve(&self, session: &Session) -> Response;

    /// Whether the engine may gzip `response` for a client that accepts it
    fn use_gzip_when_accepted(&self, response: &Response) -> bool {
        encoding::use_gzip_by_default(response)
    }
}

impl<F> SessionHandler for F
where
    F: Fn(&Session) -> Response + Send + Sync + 'static,
{
    type Guard = ();

    fn begin(&self) {}

    fn serve(&self, session: &Session) -> Response {
        self(session)
    }
}

enum EngineState {
    Idle,
    Running {
        local_addr: SocketAddr,
        shutdown: broadcast::Sender<()>,
        task: JoinHandle<()>,
    },
    Stopped {
        local_addr: SocketAddr,
    },
}

/// Embedded HTTP/1.1 server
///
/// # Examples
///
/// ```no_run
/// use fixturesrv::http::{HttpConfig, HttpEngine, Response, Session};
/// use http::StatusCode;
///
/// #[tokio::main]
/// async fn main() -> fixturesrv::Result<()> {
///     let handler = |_: &Session| Response::text(StatusCode::OK, "hello");
///     let mut engine = HttpEngine::new(HttpConfig::default(), handler);
///     engine.start().await?;
///     println!("listening on {:?}", engine.listening_port());
///     engine.stop().await;
///     Ok(())
/// }
/// ```
pub struct HttpEngine<H: SessionHandler> {
    config: HttpConfig,
    handler: Arc<H>,
    state: EngineState,
}

impl<H: SessionHandler> HttpEngine<H> {
    pub fn new(config: HttpConfig, handler: H) -> Self {
        Self::with_shared_handler(config, Arc::new(handler))
    }

    pub fn with_shared_handler(config: HttpConfig, handler: Arc<H>) -> Self {
        Self {
            config,
            handler,
            state: EngineState::Idle,
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Binds the listener and starts accepting connections.
    pub async fn start(&mut self) -> Result<()> {
        if !matches!(self.state, EngineState::Idle) {
            return Err(FixtureError::AlreadyStarted);
        }

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "HTTP engine listening");

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(accept_loop(
            listener,
            self.config.clone(),
            Arc::clone(&self.handler),
            shutdown_rx,
        ));

        self.state = EngineState::Running {
            local_addr,
            shutdown,
            task,
        };
        Ok(())
    }

    /// Stops accepting, aborts open connections and waits for the listener
    /// to close. A no-op unless the engine is running.
    pub async fn stop(&mut self) {
        let EngineState::Running { local_addr, .. } = self.state else {
            return;
        };
        let EngineState::Running { shutdown, task, .. } =
            std::mem::replace(&mut self.state, EngineState::Stopped { local_addr })
        else {
            return;
        };

        let _ = shutdown.send(());
        if let Err(e) = task.await {
            error!(error = %e, "HTTP engine task failed");
        }
    }

    /// Asks a running engine to stop without waiting for it.
    pub fn signal_stop(&self) {
        if let EngineState::Running { shutdown, .. } = &self.state {
            let _ = shutdown.send(());
        }
    }

    pub fn was_started(&self) -> bool {
        !matches!(self.state, EngineState::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, EngineState::Running { .. })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.state {
            EngineState::Idle => None,
            EngineState::Running { local_addr, .. } | EngineState::Stopped { local_addr } => {
                Some(local_addr)
            }
        }
    }

    pub fn listening_port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }
}

impl<H: SessionHandler> Drop for HttpEngine<H> {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

async fn accept_loop<H: SessionHandler>(
    listener: TcpListener,
    config: HttpConfig,
    handler: Arc<H>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let limiter = ConnectionLimiter::new(config.max_connections);
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        let guard = match limiter.try_acquire() {
                            Ok(guard) => guard,
                            Err(e) => {
                                warn!(%addr, error = %e, "Connection rejected");
                                continue;
                            }
                        };

                        debug!(%addr, current = limiter.active_connections(), "Accepted connection");
                        let config = config.clone();
                        let handler = Arc::clone(&handler);
                        let span = tracing::info_span!("connection", %addr);
                        connections.spawn(
                            async move {
                                let _slot = guard;
                                match handle_connection(stream, addr, &config, handler.as_ref()).await {
                                    Ok(()) => debug!("Connection closed"),
                                    Err(HttpProtocolError::Io(e)) => warn!(error = %e, "Connection dropped"),
                                    Err(e) => error!(error = %e, "Error handling connection"),
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                }
            }
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!(error = %e, "Connection task panicked");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Received shutdown signal, stopping HTTP engine");
                break;
            }
        }
    }

    drop(listener);
    connections.abort_all();
    while connections.join_next().await.is_some() {}
    info!("HTTP engine stopped");
}

async fn handle_connection<H: SessionHandler>(
    stream: TcpStream,
    addr: SocketAddr,
    config: &HttpConfig,
    handler: &H,
) -> std::result::Result<(), HttpProtocolError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%addr, error = %e, "Could not set TCP_NODELAY");
    }
    let mut connection = HttpConnection::new(stream, Some(addr));

    loop {
        let session = match connection.read_session(config).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!(%addr, "Client closed connection");
                break;
            }
            Err(HttpProtocolError::Timeout(what)) => {
                debug!(%addr, what, "Idle connection timed out");
                break;
            }
            Err(e) => {
                if let Some(status) = e.response_status() {
                    let response = Response::text(status, e.to_string());
                    let _ = connection
                        .write_response(&Method::GET, &response, false, config)
                        .await;
                }
                return Err(e);
            }
        };

        let keep_alive = config.keep_alive && session.keep_alive();

        // Released when this iteration ends, whichever way it ends.
        let _exchange = handler.begin();

        let mut response = handler.serve(&session);
        if session.accepts_encoding(GZIP) && handler.use_gzip_when_accepted(&response) {
            if let Err(e) = encoding::apply_gzip(&mut response) {
                warn!(%addr, error = %e, "Sending response uncompressed");
            }
        }

        let sent = connection
            .write_response(&session.method, &response, keep_alive, config)
            .await?;
        info!(
            %addr,
            method = %session.method,
            uri = %session.uri,
            status = response.status().as_u16(),
            bytes = sent,
            "Served request"
        );

        if !keep_alive {
            break;
        }
    }

    connection.shutdown().await;
    Ok(())
}
