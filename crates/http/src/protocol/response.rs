//! HTTP response header handling.

use http::Response;

/// The header portion of an HTTP response, before a body is attached.
pub type ResponseHead = Response<()>;
