//! Per-request service context.
//!
//! A [`ServiceContext`] is created once the decoded head has been routed to a
//! handler and is bound to the request stream via
//! [`RequestStream::init`](crate::stream::RequestStream::init). It carries the
//! effective max-body-length policy and the [`RequestLog`] sink the stream
//! reports into while body bytes flow.

use std::cell::RefCell;
use std::time::Instant;

use http::{Method, Version};
use tracing::trace;

use crate::protocol::RequestHeader;

/// Per-request metadata bound to a request stream after header decode.
#[derive(Debug)]
pub struct ServiceContext {
    max_request_length: u64,
    log: RequestLog,
}

impl ServiceContext {
    pub fn new(max_request_length: u64) -> Self {
        Self { max_request_length, log: RequestLog::default() }
    }

    /// The effective request body limit for this request. Once a context is
    /// bound, this value overrides the connection-level default.
    pub fn max_request_length(&self) -> u64 {
        self.max_request_length
    }

    pub fn log(&self) -> &RequestLog {
        &self.log
    }
}

/// Log sink recording what was observed about a request while it streamed in.
///
/// Interior-mutable so that the request stream and the connection can both
/// report through a shared `Rc<ServiceContext>`; everything happens on the
/// connection's own task.
#[derive(Debug, Default)]
pub struct RequestLog {
    inner: RefCell<LogInner>,
}

#[derive(Debug, Default)]
struct LogInner {
    method: Option<Method>,
    path: Option<String>,
    version: Option<Version>,
    first_bytes_at: Option<Instant>,
    request_length: u64,
}

impl RequestLog {
    /// Records the decoded request headers.
    pub fn request_headers(&self, header: &RequestHeader) {
        let mut inner = self.inner.borrow_mut();
        inner.method = Some(header.method().clone());
        inner.path = Some(header.uri().path().to_string());
        inner.version = Some(header.version());
        trace!(method = %header.method(), path = header.uri().path(), "request headers recorded");
    }

    /// Stamps the instant the first request bytes became observable. Only the
    /// first call takes effect.
    pub fn request_first_bytes_transferred(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.first_bytes_at.is_none() {
            inner.first_bytes_at = Some(Instant::now());
        }
    }

    /// Records the cumulative number of request body bytes transferred so far.
    pub fn request_length(&self, transferred: u64) {
        self.inner.borrow_mut().request_length = transferred;
    }

    pub fn recorded_request_length(&self) -> u64 {
        self.inner.borrow().request_length
    }

    pub fn first_bytes_transferred_at(&self) -> Option<Instant> {
        self.inner.borrow().first_bytes_at
    }

    pub fn method(&self) -> Option<Method> {
        self.inner.borrow().method.clone()
    }

    pub fn path(&self) -> Option<String> {
        self.inner.borrow().path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    #[test]
    fn records_headers_and_length() {
        let ctx = ServiceContext::new(500);
        assert_eq!(ctx.max_request_length(), 500);

        let header = RequestHeader::from(Request::builder().method(Method::POST).uri("/upload").body(()).unwrap());
        ctx.log().request_headers(&header);
        ctx.log().request_length(42);

        assert_eq!(ctx.log().method(), Some(Method::POST));
        assert_eq!(ctx.log().path(), Some("/upload".to_string()));
        assert_eq!(ctx.log().recorded_request_length(), 42);
    }

    #[test]
    fn first_bytes_instant_is_stamped_once() {
        let ctx = ServiceContext::new(0);
        assert!(ctx.log().first_bytes_transferred_at().is_none());

        ctx.log().request_first_bytes_transferred();
        let first = ctx.log().first_bytes_transferred_at().unwrap();

        ctx.log().request_first_bytes_transferred();
        assert_eq!(ctx.log().first_bytes_transferred_at(), Some(first));
    }
}
