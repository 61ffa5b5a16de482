//! Server configuration.

use crate::stream::{DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK};

/// Default limit on the decoded length of a request body, in bytes.
pub const DEFAULT_MAX_REQUEST_LENGTH: u64 = 10 * 1024 * 1024;

/// Initial capacity of the connection read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Connection-level configuration.
///
/// `max_request_length` seeds both the request stream's default limit (in
/// force before a per-request context exists) and the context created for each
/// request. The watermarks parameterize the connection's inbound traffic
/// accounting.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_request_length: u64,
    pub high_watermark: usize,
    pub low_watermark: usize,
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_request_length: DEFAULT_MAX_REQUEST_LENGTH,
            high_watermark: DEFAULT_HIGH_WATERMARK,
            low_watermark: DEFAULT_LOW_WATERMARK,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    /// Overrides the request body limit.
    pub fn with_max_request_length(mut self, limit: u64) -> Self {
        self.max_request_length = limit;
        self
    }
}
