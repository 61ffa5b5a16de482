//! HTTP connection handling.
//!
//! [`HttpConnection`] owns one accepted connection end to end: decoding
//! request heads, building the per-request stream coordination, running the
//! handler while the body streams in under backpressure, and writing
//! responses until the connection stops being reusable.

mod http_connection;

pub use http_connection::HttpConnection;
