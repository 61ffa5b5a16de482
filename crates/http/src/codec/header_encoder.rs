//! HTTP response head encoding.
//!
//! Serializes the status line and header fields, fixing up the framing
//! headers (Content-Length / Transfer-Encoding) from the payload size decided
//! by the caller. Only HTTP/1.1 responses are produced.

use std::io::{self, ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::BytesWriter;
use crate::protocol::{PayloadSize, ResponseHead, SendError};

/// Buffer space reserved up front for a serialized head
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encodes a [`ResponseHead`] plus its [`PayloadSize`] into wire bytes.
#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match head.version() {
            Version::HTTP_11 => {
                write!(
                    BytesWriter(dst),
                    "HTTP/1.1 {} {}\r\n",
                    head.status().as_str(),
                    head.status().canonical_reason().unwrap_or("Unknown")
                )?;
            }
            v => {
                error!(http_version = ?v, "unsupported response version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        // the payload size decided by the connection wins over whatever the
        // handler left in the framing headers
        match payload_size {
            PayloadSize::Length(n) => {
                head.headers_mut().insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                head.headers_mut().insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            PayloadSize::Empty => {
                head.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            }
        }

        for (name, value) in head.headers().iter() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    #[test]
    fn encodes_status_line_and_content_length() {
        let head: ResponseHead = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let mut dst = BytesMut::new();

        HeaderEncoder.encode((head, PayloadSize::Length(5)), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn chunked_payload_sets_transfer_encoding() {
        let head: ResponseHead = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let mut dst = BytesMut::new();

        HeaderEncoder.encode((head, PayloadSize::Chunked), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.contains("transfer-encoding: chunked\r\n"));
        assert!(!text.contains("content-length"));
    }

    #[test]
    fn empty_payload_gets_zero_content_length() {
        let head: ResponseHead =
            Response::builder().status(StatusCode::NO_CONTENT).body(()).unwrap();
        let mut dst = BytesMut::new();

        HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(text.contains("content-length: 0\r\n"));
    }
}
