use bytes::Bytes;
use http::StatusCode;

/// MIME type used when a response does not name one
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A complete response: status, MIME type, fixed-length body and extra headers
///
/// `Content-Type` and `Content-Length` are written from the MIME type and
/// body; `headers` holds everything else, in insertion order.
///
/// # Examples
///
/// ```
/// use fixturesrv::http::Response;
/// use http::StatusCode;
///
/// let response = Response::text(StatusCode::OK, "hello")
///     .with_header("X-Fixture", "yes");
/// assert_eq!(response.mime_type(), "text/plain; charset=utf-8");
/// assert_eq!(response.header("x-fixture"), Some("yes"));
/// assert_eq!(response.body().as_ref(), b"hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    mime_type: String,
    body: Bytes,
    headers: Vec<(String, String)>,
}

impl Response {
    /// Empty `application/octet-stream` response
    pub fn new(status: StatusCode) -> Self {
        Self::fixed_length(status, OCTET_STREAM, Bytes::new())
    }

    pub fn fixed_length(status: StatusCode, mime_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            mime_type: mime_type.into(),
            body: body.into(),
            headers: Vec::new(),
        }
    }

    /// UTF-8 `text/plain` response
    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::fixed_length(status, "text/plain; charset=utf-8", text.into())
    }

    /// Appends a header; earlier headers with the same name are kept.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// First value of header `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }
}
