use super::session::Headers;
use crate::{FixtureError, Result};
use bytes::{Bytes, BytesMut};
use http::{Method, StatusCode, Uri};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Configuration for [`FixtureClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Read timeout for operations
    pub read_timeout: Duration,
    /// Write timeout for operations
    pub write_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Buffer size for reading data
    pub buffer_size: usize,
    /// Maximum response body size to prevent memory exhaustion
    pub max_response_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            buffer_size: 8192,
            max_response_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Builder for client configuration
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn max_response_size(mut self, size: usize) -> Self {
        self.config.max_response_size = size;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Status line and headers of a response whose body has not been read yet
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: Headers,
    pub content_length: usize,
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Bytes,
}

impl ClientResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(FixtureError::Utf8)
    }
}

/// Minimal HTTP/1.1 client for exercising fixture servers
///
/// One client owns one connection; requests on it are sent one at a time.
///
/// # Examples
///
/// ```no_run
/// use fixturesrv::http::FixtureClient;
///
/// #[tokio::main]
/// async fn main() -> fixturesrv::Result<()> {
///     let mut client = FixtureClient::connect("127.0.0.1:8080".parse().unwrap()).await?;
///     let response = client.get("/hello").await?;
///     println!("{} {}", response.status, response.text()?);
///     Ok(())
/// }
/// ```
pub struct FixtureClient {
    stream: TcpStream,
    host: String,
    config: ClientConfig,
    buffer: BytesMut,
}

impl FixtureClient {
    /// Connect with default configuration
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_with_config(addr, ClientConfig::default()).await
    }

    pub async fn connect_with_config(addr: SocketAddr, config: ClientConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| FixtureError::Timeout("Connection timeout".to_string()))??;
        Ok(Self::from_stream(stream, addr.to_string(), config))
    }

    /// Connects to the authority of `uri`, which must carry a port.
    pub async fn connect_uri(uri: &Uri) -> Result<Self> {
        let host = uri
            .host()
            .ok_or_else(|| FixtureError::Config(format!("URI has no host: {uri}")))?;
        let port = uri
            .port_u16()
            .ok_or_else(|| FixtureError::Config(format!("URI has no port: {uri}")))?;
        let config = ClientConfig::default();
        let stream = timeout(config.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| FixtureError::Timeout("Connection timeout".to_string()))??;
        Ok(Self::from_stream(stream, format!("{host}:{port}"), config))
    }

    fn from_stream(stream: TcpStream, host: String, config: ClientConfig) -> Self {
        Self {
            stream,
            host,
            buffer: BytesMut::with_capacity(config.buffer_size),
            config,
        }
    }

    pub async fn get(&mut self, path: &str) -> Result<ClientResponse> {
        self.request(Method::GET, path, &[], &[]).await
    }

    /// Sends one request and reads the whole response.
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<ClientResponse> {
        self.send(&method, path, headers, body).await?;
        let head = self.read_head().await?;
        let body = if method == Method::HEAD {
            Bytes::new()
        } else {
            self.read_body(&head).await?
        };
        Ok(ClientResponse {
            status: head.status,
            headers: head.headers,
            body,
        })
    }

    /// Writes a request without waiting for the response.
    pub async fn send(&mut self, method: &Method, path: &str, headers: &[(&str, &str)], body: &[u8]) -> Result<()> {
        let mut request = format!("{method} {path} HTTP/1.1\r\nHost: {}\r\n", self.host);
        for (name, value) in headers {
            request.push_str(&format!("{name}: {value}\r\n"));
        }
        if !body.is_empty() {
            request.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        request.push_str("\r\n");

        let mut bytes = request.into_bytes();
        bytes.extend_from_slice(body);

        timeout(self.config.write_timeout, self.stream.write_all(&bytes))
            .await
            .map_err(|_| FixtureError::Timeout("Write timeout".to_string()))??;
        timeout(self.config.write_timeout, self.stream.flush())
            .await
            .map_err(|_| FixtureError::Timeout("Flush timeout".to_string()))??;
        Ok(())
    }

    async fn fill(&mut self) -> Result<usize> {
        self.buffer.reserve(self.config.buffer_size);
        let n = timeout(self.config.read_timeout, self.stream.read_buf(&mut self.buffer))
            .await
            .map_err(|_| FixtureError::Timeout("Read timeout".to_string()))??;
        Ok(n)
    }

    /// Reads the status line and headers of the next response.
    pub async fn read_head(&mut self) -> Result<ResponseHead> {
        loop {
            if let Some((len, head)) = parse_response_head(&self.buffer)? {
                let _ = self.buffer.split_to(len);
                return Ok(head);
            }
            if self.fill().await? == 0 {
                return Err(FixtureError::Protocol(
                    "connection closed before response head".to_string(),
                ));
            }
        }
    }

    /// Reads the body announced by `head`.
    pub async fn read_body(&mut self, head: &ResponseHead) -> Result<Bytes> {
        if head.content_length > self.config.max_response_size {
            return Err(FixtureError::Config(format!(
                "Response too large: {} bytes, max allowed: {}",
                head.content_length, self.config.max_response_size
            )));
        }
        while self.buffer.len() < head.content_length {
            if self.fill().await? == 0 {
                return Err(FixtureError::Protocol(format!(
                    "connection closed after {} of {} body bytes",
                    self.buffer.len(),
                    head.content_length
                )));
            }
        }
        Ok(self.buffer.split_to(head.content_length).freeze())
    }
}

fn parse_response_head(buf: &[u8]) -> Result<Option<(usize, ResponseHead)>> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut response = httparse::Response::new(&mut headers);
    let len = match response.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(FixtureError::Protocol(format!("bad response head: {e}"))),
    };

    let code = response
        .code
        .ok_or_else(|| FixtureError::Protocol("missing status code".to_string()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|e| FixtureError::Protocol(format!("bad status code {code}: {e}")))?;
    let headers: Headers = response
        .headers
        .iter()
        .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
        .collect();
    let content_length = match headers.get("content-length") {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| FixtureError::Protocol(format!("bad Content-Length {value:?}")))?,
        None => 0,
    };

    Ok(Some((
        len,
        ResponseHead {
            status,
            headers,
            content_length,
        },
    )))
}

/// Fetches `uri` over a fresh connection with `Connection: close`.
pub async fn fetch(uri: &Uri) -> Result<ClientResponse> {
    fetch_with_headers(uri, &[]).await
}

pub async fn fetch_with_headers(uri: &Uri, headers: &[(&str, &str)]) -> Result<ClientResponse> {
    let mut client = FixtureClient::connect_uri(uri).await?;
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let mut all_headers = vec![("Connection", "close")];
    all_headers.extend_from_slice(headers);
    client.request(Method::GET, path, &all_headers, &[]).await
}
