use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the embedded HTTP engine
///
/// # Examples
///
/// ```rust
/// use fixturesrv::http::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::default()
///     .with_port(8080)
///     .with_write_timeout(Duration::from_secs(5))
///     .with_keep_alive(false);
/// assert_eq!(config.bind_addr.port(), 8080);
/// assert!(!config.keep_alive);
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to; port 0 picks an ephemeral port
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Chunk size for reading requests and writing response bodies
    pub buffer_size: usize,
    /// Read timeout while waiting for a request
    pub read_timeout: Duration,
    /// Timeout for writing one chunk of a response
    pub write_timeout: Duration,
    /// Largest accepted request (head plus body) in bytes
    pub max_request_size: usize,
    /// Value of the `Server` response header (optional)
    pub server_name: Option<String>,
    /// Whether HTTP/1.1 connections are reused for further requests
    pub keep_alive: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            max_connections: 100,
            buffer_size: 8192, // Larger buffer for HTTP
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_request_size: 1024 * 1024, // 1MB
            server_name: Some(format!("fixturesrv/{}", env!("CARGO_PKG_VERSION"))),
            keep_alive: true,
        }
    }
}

impl HttpConfig {
    /// Keep the bind IP, change the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_max_request_size(mut self, max_request_size: usize) -> Self {
        self.max_request_size = max_request_size;
        self
    }

    pub fn with_server_name(mut self, server_name: Option<String>) -> Self {
        self.server_name = server_name;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}
