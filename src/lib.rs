//! # fixturesrv
//!
//! An embeddable HTTP fixture server for tests. Routes are tried in order,
//! unmatched requests get a default response, and [`ServerControl::flush`]
//! waits until every request that was in flight when it was called has
//! finished writing its response.
//!
//! ```no_run
//! use fixturesrv::FixtureServer;
//! use fixturesrv::http::Response;
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> fixturesrv::Result<()> {
//!     let server = FixtureServer::builder()
//!         .get_path("/hello", |_| Response::text(StatusCode::OK, "hi"))
//!         .build();
//!
//!     let mut control = server.start_server().await?;
//!     println!("serving on {}", control.base_uri("http")?);
//!
//!     control.flush().await?;
//!     control.stop().await;
//!     Ok(())
//! }
//! ```

use crate::barrier::BarrierError;
use crate::http::protocol::HttpProtocolError;
use crate::limits::LimitError;
use thiserror::Error;

/// Error types for the fixturesrv library
#[derive(Error, Debug)]
pub enum FixtureError {
    /// Socket errors (bind, accept, connect, read, write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unsupported HTTP traffic
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Port 0 passed where a concrete port is required
    #[error("Invalid port {0}: use start_server() for an ephemeral port")]
    InvalidPort(u16),

    /// Scheme other than http or https
    #[error("Invalid scheme {0:?}: expected http or https")]
    InvalidScheme(String),

    /// Operation needs a started, not yet stopped server
    #[error("Server is not running: cannot {0}")]
    NotRunning(&'static str),

    #[error("Server was already started")]
    AlreadyStarted,

    #[error("Flush cancelled while waiting for generation {generation}")]
    FlushCancelled { generation: u64 },

    /// Resource limit exceeded
    #[error(transparent)]
    Limit(#[from] LimitError),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// UTF-8 encoding errors
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl From<HttpProtocolError> for FixtureError {
    fn from(err: HttpProtocolError) -> Self {
        match err {
            HttpProtocolError::Io(e) => FixtureError::Io(e),
            HttpProtocolError::TooLarge(e) => FixtureError::Limit(e),
            HttpProtocolError::Timeout(what) => FixtureError::Timeout(format!("{what} timeout")),
            other => FixtureError::Protocol(other.to_string()),
        }
    }
}

impl From<BarrierError> for FixtureError {
    fn from(err: BarrierError) -> Self {
        match err {
            BarrierError::Cancelled { generation } => FixtureError::FlushCancelled { generation },
        }
    }
}

/// Result type for the fixturesrv library
pub type Result<T> = std::result::Result<T, FixtureError>;

pub mod barrier;
pub mod control;
pub mod dispatch;
pub mod http;
pub mod limits;

// Re-export main types for convenience
pub use barrier::{CompletionBarrier, RequestTicket};
pub use control::{
    FixtureServer, FixtureServerBuilder, HostAddress, ServerControl, any_content_encoding_specified,
};
pub use dispatch::{RequestDispatcher, RequestView, Route};
pub use crate::http::{FixtureClient, HttpConfig, Response, Session};
