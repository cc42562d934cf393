use crate::http::{QueryParams, Session};
use bytes::Bytes;
use http::Method;

/// What predicates and responders get to see of a request
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    session: &'a Session,
}

impl<'a> RequestView<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub fn method(&self) -> &'a Method {
        &self.session.method
    }

    /// Path component of the request target
    pub fn path(&self) -> &'a str {
        self.session.path()
    }

    pub fn query(&self) -> &'a QueryParams {
        &self.session.query
    }

    /// Header lookup: exact name first, then ASCII case-insensitive
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.session.headers.get(name)
    }

    pub fn uri(&self) -> &'a str {
        &self.session.uri
    }

    pub fn body(&self) -> &'a Bytes {
        &self.session.body
    }

    pub fn session(&self) -> &'a Session {
        self.session
    }
}

impl<'a> From<&'a Session> for RequestView<'a> {
    fn from(session: &'a Session) -> Self {
        Self::new(session)
    }
}
