//! HTTP/1.1 wire codec.
//!
//! Streaming encoding and decoding of HTTP messages on top of the
//! `tokio_util` codec traits:
//!
//! - [`RequestDecoder`]: request heads and payload items off the read half
//!   (head parsing via httparse, payload strategies per framing headers)
//! - [`ResponseEncoder`]: response heads and payload items onto the write
//!   half (status line plus framing fix-up, identity or chunked payload)
//!
//! Both sides are phase machines: a head switches the codec into its payload
//! phase, the payload's end switches it back.

mod body_decoder;
mod body_encoder;
mod header_decoder;
mod header_encoder;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;

use bytes::{BufMut, BytesMut};
use std::io;

/// `io::Write` adapter over a `BytesMut`, for `write!`-style formatting into
/// the encode buffer without an intermediate allocation.
pub(crate) struct BytesWriter<'a>(pub &'a mut BytesMut);

impl io::Write for BytesWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
