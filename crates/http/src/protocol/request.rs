//! HTTP request header handling.
//!
//! Wraps the standard `http::Request` type with the pieces the server needs
//! before a body is attached: method-based body expectations and the
//! keep-alive policy decided from the request line and `Connection` header.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// The decoded head of an HTTP request, without its body.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, converting this header into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether a request with this method may carry a body.
    ///
    /// GET, HEAD, DELETE, OPTIONS and CONNECT requests are treated as bodyless.
    pub fn need_body(&self) -> bool {
        !matches!(
            self.method(),
            &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT
        )
    }

    /// Whether the connection should be kept open after this exchange.
    ///
    /// HTTP/1.1 defaults to keep-alive unless the request says
    /// `Connection: close`; HTTP/1.0 defaults to close unless the request says
    /// `Connection: keep-alive`. Anything older is never kept alive.
    pub fn is_keep_alive(&self) -> bool {
        let connection = self.headers().get(http::header::CONNECTION).and_then(|v| v.to_str().ok());
        match self.version() {
            Version::HTTP_11 => !connection_contains(connection, "close"),
            Version::HTTP_10 => connection_contains(connection, "keep-alive"),
            _ => false,
        }
    }
}

fn connection_contains(header: Option<&str>, token: &str) -> bool {
    match header {
        Some(value) => value.split(',').any(|part| part.trim().eq_ignore_ascii_case(token)),
        None => false,
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: Version, connection: Option<&str>) -> RequestHeader {
        let mut builder = Request::builder().method(Method::GET).uri("/").version(version);
        if let Some(value) = connection {
            builder = builder.header(http::header::CONNECTION, value);
        }
        RequestHeader::from(builder.body(()).unwrap())
    }

    #[test]
    fn http11_defaults_to_keep_alive() {
        assert!(header(Version::HTTP_11, None).is_keep_alive());
    }

    #[test]
    fn http11_close_disables_keep_alive() {
        assert!(!header(Version::HTTP_11, Some("close")).is_keep_alive());
        assert!(!header(Version::HTTP_11, Some("Close")).is_keep_alive());
    }

    #[test]
    fn http10_defaults_to_close() {
        assert!(!header(Version::HTTP_10, None).is_keep_alive());
        assert!(header(Version::HTTP_10, Some("keep-alive")).is_keep_alive());
    }

    #[test]
    fn connection_header_with_multiple_tokens() {
        assert!(!header(Version::HTTP_11, Some("upgrade, close")).is_keep_alive());
    }

    #[test]
    fn bodyless_methods() {
        let get = header(Version::HTTP_11, None);
        assert!(!get.need_body());

        let post = RequestHeader::from(Request::builder().method(Method::POST).uri("/").body(()).unwrap());
        assert!(post.need_body());
    }
}
