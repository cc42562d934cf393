//! Parsed view of one inbound request as handed to a
//! [`SessionHandler`](super::server::SessionHandler)

use bytes::Bytes;
use http::{Method, Version};
use std::net::SocketAddr;

/// Request headers in arrival order, names kept exactly as the client sent them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value whose name matches `name` exactly
    pub fn get_exact(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First value for `name`, trying an exact match before an ASCII
    /// case-insensitive one
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_exact(name).or_else(|| {
            self.entries
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    /// Every value for `name`, compared case-insensitively
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// Multi-valued query parameters
///
/// Keys keep the order in which they first appeared; values keep the order
/// in which they appeared for their key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `application/x-www-form-urlencoded` query string.
    ///
    /// Malformed input yields whatever pairs could be decoded before the
    /// error; query strings from test clients are not worth rejecting a
    /// request over.
    pub fn parse(query: &str) -> Self {
        let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::debug!(error = %e, query, "Unparseable query string");
                Vec::new()
            }
        };
        pairs.into_iter().collect()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into()),
            None => self.entries.push((key, vec![value.into()])),
        }
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// All values for `key`, in order
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Flattened `(key, value)` pairs, grouped by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            params.push(key, value);
        }
        params
    }
}

/// One parsed HTTP request
#[derive(Debug, Clone)]
pub struct Session {
    pub method: Method,
    /// Request target exactly as it appeared on the request line
    pub uri: String,
    pub version: Version,
    pub headers: Headers,
    pub query: QueryParams,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl Session {
    /// Path component of the request target, without the query string
    pub fn path(&self) -> &str {
        let path = self.uri.split(['?', '#']).next().unwrap_or_default();
        // Absolute-form targets ("http://host/path") are legal on the request line.
        match path.find("://") {
            Some(scheme_end) => {
                let rest = &path[scheme_end + 3..];
                rest.find('/').map_or("/", |slash| &rest[slash..])
            }
            None => path,
        }
    }

    /// Raw query string, if the target had one
    pub fn query_string(&self) -> Option<&str> {
        let without_fragment = self.uri.split('#').next().unwrap_or_default();
        without_fragment.split_once('?').map(|(_, query)| query)
    }

    /// Whether the client said it accepts `encoding` in `Accept-Encoding`
    pub fn accepts_encoding(&self, encoding: &str) -> bool {
        self.headers.get_all("accept-encoding").any(|value| {
            value
                .split(',')
                .map(|token| token.split(';').next().unwrap_or_default().trim())
                .any(|token| token.eq_ignore_ascii_case(encoding) || token == "*")
        })
    }

    /// Whether the connection should stay open after this exchange
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers.get("connection").map(str::to_ascii_lowercase);
        match self.version {
            Version::HTTP_11 => connection.as_deref() != Some("close"),
            Version::HTTP_10 => connection.as_deref() == Some("keep-alive"),
            _ => false,
        }
    }
}
