//! The outbound side of a request context.
//!
//! [`ResponseSink`] mimics a connection-backed writer: the first status write
//! (or the first body write, which implies `200 OK`) commits the status line
//! and headers. After that point status and header changes are ignored and
//! body bytes can only be appended, never taken back.

use crate::body::ResponseBody;
use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Response, StatusCode};
use tracing::warn;

#[derive(Debug)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    committed: bool,
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink {
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: BytesMut::new(), committed: false }
    }

    /// The committed status, or `200 OK` if nothing was written yet.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns true once the status line and headers can no longer change.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Sets a header before commit. Returns false if the sink is already committed.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.committed {
            warn!(header = %name, "response already committed, header ignored");
            return false;
        }
        self.headers.insert(name, value);
        true
    }

    /// Appends a header before commit. Returns false if the sink is already committed.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.committed {
            warn!(header = %name, "response already committed, header ignored");
            return false;
        }
        self.headers.append(name, value);
        true
    }

    /// Commits the status line and headers. A second call is ignored.
    pub fn write_header(&mut self, status: StatusCode) -> bool {
        if self.committed {
            warn!(current = %self.status, ignored = %status, "superfluous status write");
            return false;
        }
        self.status = status;
        self.committed = true;
        true
    }

    /// Appends body bytes, committing `200 OK` first if needed.
    pub fn write(&mut self, data: &[u8]) {
        if !self.committed {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
    }

    pub(crate) fn into_response(self) -> Response<ResponseBody> {
        let (status, headers, body) = self.into_parts();
        let mut response = Response::new(ResponseBody::once(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body.freeze())
    }
}
