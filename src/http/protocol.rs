//! HTTP/1.x framing for one server-side connection
//!
//! Requests are parsed incrementally with `httparse`; bytes that arrive past
//! the end of one request stay buffered for the next one on a keep-alive
//! connection. Responses are always fixed-length.

use super::config::HttpConfig;
use super::session::{Headers, QueryParams, Session};
use super::Response;
use crate::limits::{LimitError, SizeValidator};
use bytes::BytesMut;
use http::{Method, StatusCode, Version};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

const MAX_HEADERS: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Incomplete request")]
    IncompleteRequest,
    #[error(transparent)]
    TooLarge(#[from] LimitError),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("{0} timeout")]
    Timeout(&'static str),
}

impl HttpProtocolError {
    /// Status to answer with before closing, for errors the client caused
    pub fn response_status(&self) -> Option<StatusCode> {
        match self {
            HttpProtocolError::HttpParse(_) | HttpProtocolError::InvalidRequest(_) => {
                Some(StatusCode::BAD_REQUEST)
            }
            HttpProtocolError::TooLarge(_) => Some(StatusCode::PAYLOAD_TOO_LARGE),
            HttpProtocolError::Unsupported(_) => Some(StatusCode::NOT_IMPLEMENTED),
            HttpProtocolError::Io(_)
            | HttpProtocolError::IncompleteRequest
            | HttpProtocolError::Timeout(_) => None,
        }
    }
}

/// Owned copy of a parsed request head
struct RequestHead {
    len: usize,
    method: Method,
    uri: String,
    version: Version,
    headers: Headers,
}

fn parse_head(buf: &[u8]) -> Result<Option<RequestHead>, HttpProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let len = match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => {
            return Err(HttpProtocolError::HttpParse(format!("Failed to parse headers: {e}")));
        }
    };

    let method = req
        .method
        .ok_or_else(|| HttpProtocolError::InvalidRequest("missing method".to_string()))?;
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|e| HttpProtocolError::InvalidRequest(format!("bad method {method}: {e}")))?;
    let uri = req
        .path
        .ok_or_else(|| HttpProtocolError::InvalidRequest("missing request target".to_string()))?
        .to_string();
    let version = match req.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };
    let headers = req
        .headers
        .iter()
        .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
        .collect();

    Ok(Some(RequestHead {
        len,
        method,
        uri,
        version,
        headers,
    }))
}

/// Server side of one HTTP connection
pub struct HttpConnection<S> {
    inner: S,
    buffer: BytesMut,
    peer: Option<SocketAddr>,
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(inner: S, peer: Option<SocketAddr>) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            peer,
        }
    }

    /// Reads more bytes into the buffer, returning how many arrived.
    async fn fill(&mut self, config: &HttpConfig) -> Result<usize, HttpProtocolError> {
        self.buffer.reserve(config.buffer_size);
        timeout(config.read_timeout, self.inner.read_buf(&mut self.buffer))
            .await
            .map_err(|_| HttpProtocolError::Timeout("Read"))?
            .map_err(HttpProtocolError::Io)
    }

    /// Reads the next request.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly
    /// between requests.
    pub async fn read_session(&mut self, config: &HttpConfig) -> Result<Option<Session>, HttpProtocolError> {
        let limit = SizeValidator::new(config.max_request_size);

        let head = loop {
            if !self.buffer.is_empty() {
                if let Some(head) = parse_head(&self.buffer)? {
                    break head;
                }
                limit.validate_size(self.buffer.len())?;
            }

            if self.fill(config).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(HttpProtocolError::IncompleteRequest);
            }
        };

        if head
            .headers
            .get_all("transfer-encoding")
            .any(|value| !value.trim().eq_ignore_ascii_case("identity"))
        {
            return Err(HttpProtocolError::Unsupported("chunked request bodies".to_string()));
        }

        let content_length = match head.headers.get("content-length") {
            Some(value) => value.trim().parse::<usize>().map_err(|_| {
                HttpProtocolError::InvalidRequest(format!("bad Content-Length {value:?}"))
            })?,
            None => 0,
        };
        limit.validate_size(head.len + content_length)?;

        while self.buffer.len() < head.len + content_length {
            if self.fill(config).await? == 0 {
                return Err(HttpProtocolError::IncompleteRequest);
            }
        }

        let _ = self.buffer.split_to(head.len);
        let body = self.buffer.split_to(content_length).freeze();
        let query = head
            .uri
            .split('#')
            .next()
            .and_then(|target| target.split_once('?'))
            .map(|(_, query)| QueryParams::parse(query))
            .unwrap_or_default();

        trace!(method = %head.method, uri = %head.uri, body = body.len(), "Parsed request");

        Ok(Some(Session {
            method: head.method,
            uri: head.uri,
            version: head.version,
            headers: head.headers,
            query,
            body,
            remote_addr: self.peer,
        }))
    }

    /// Writes `response` and flushes, returning the number of body bytes sent.
    ///
    /// The body is written in `buffer_size` chunks, each bounded by
    /// `write_timeout`. Bodies of responses to `HEAD` are omitted.
    pub async fn write_response(
        &mut self,
        method: &Method,
        response: &Response,
        keep_alive: bool,
        config: &HttpConfig,
    ) -> Result<usize, HttpProtocolError> {
        let head = encode_head(response, keep_alive, config);
        self.write_with_timeout(head.as_bytes(), config).await?;

        let body: &[u8] = if method == Method::HEAD { &[] } else { response.body() };
        for chunk in body.chunks(config.buffer_size.max(1)) {
            self.write_with_timeout(chunk, config).await?;
        }

        timeout(config.write_timeout, self.inner.flush())
            .await
            .map_err(|_| HttpProtocolError::Timeout("Flush"))??;
        Ok(body.len())
    }

    async fn write_with_timeout(&mut self, data: &[u8], config: &HttpConfig) -> Result<(), HttpProtocolError> {
        timeout(config.write_timeout, self.inner.write_all(data))
            .await
            .map_err(|_| HttpProtocolError::Timeout("Write"))??;
        Ok(())
    }

    /// Best-effort shutdown of the write side
    pub async fn shutdown(&mut self) {
        let _ = self.inner.shutdown().await;
    }
}

fn encode_head(response: &Response, keep_alive: bool, config: &HttpConfig) -> String {
    let status = response.status();
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown"),
        response.mime_type(),
        response.content_length(),
        if keep_alive { "keep-alive" } else { "close" },
    );
    if let Some(server_name) = &config.server_name {
        if response.header("server").is_none() {
            head.push_str(&format!("Server: {server_name}\r\n"));
        }
    }
    for (name, value) in response.headers() {
        let reserved = ["content-type", "content-length", "connection"];
        if reserved.iter().any(|r| name.eq_ignore_ascii_case(r)) {
            continue;
        }
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    head
}
