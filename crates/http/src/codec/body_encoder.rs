//! Response payload encoding.

use std::io::Write;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::codec::BytesWriter;
use crate::protocol::{PayloadItem, PayloadSize, SendError};

/// Encodes the payload phase of one response: identity writing for a known
/// Content-Length, chunked framing otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length { remaining: u64 },
    Chunked { eof: bool },
    NoBody,
}

impl BodyEncoder {
    pub fn new(payload_size: PayloadSize) -> Self {
        let kind = match payload_size {
            PayloadSize::Length(length) => Kind::Length { remaining: length },
            PayloadSize::Chunked => Kind::Chunked { eof: false },
            PayloadSize::Empty => Kind::NoBody,
        };
        Self { kind }
    }

    /// Whether every byte the payload phase owes has been written.
    pub fn is_finished(&self) -> bool {
        match &self.kind {
            Kind::Length { remaining } => *remaining == 0,
            Kind::Chunked { eof } => *eof,
            Kind::NoBody => true,
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for BodyEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length { remaining } => match item {
                PayloadItem::Chunk(bytes) => {
                    let len = bytes.remaining() as u64;
                    if len == 0 {
                        return Ok(());
                    }
                    if len > *remaining {
                        return Err(SendError::invalid_body("body exceeds the declared content-length"));
                    }
                    dst.put(bytes);
                    *remaining -= len;
                    Ok(())
                }
                PayloadItem::Eof => {
                    if *remaining > 0 {
                        warn!(remaining = *remaining, "body ended before the declared content-length");
                    }
                    Ok(())
                }
            },

            Kind::Chunked { eof } => {
                if *eof {
                    return Ok(());
                }
                match item {
                    PayloadItem::Chunk(bytes) => {
                        // a zero-length chunk would encode the terminator
                        if !bytes.has_remaining() {
                            return Ok(());
                        }
                        write!(BytesWriter(dst), "{:X}\r\n", bytes.remaining())?;
                        dst.put(bytes);
                        dst.extend_from_slice(b"\r\n");
                        Ok(())
                    }
                    PayloadItem::Eof => {
                        *eof = true;
                        dst.extend_from_slice(b"0\r\n\r\n");
                        Ok(())
                    }
                }
            }

            Kind::NoBody => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn length_encoding_is_identity() {
        let mut encoder = BodyEncoder::new(PayloadSize::Length(5));
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"hello");
        assert!(encoder.is_finished());
    }

    #[test]
    fn length_encoding_rejects_excess_bytes() {
        let mut encoder = BodyEncoder::new(PayloadSize::Length(3));
        let mut dst = BytesMut::new();
        assert!(encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).is_err());
    }

    #[test]
    fn chunked_encoding_frames_each_chunk() {
        let mut encoder = BodyEncoder::new(PayloadSize::Chunked);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b", world")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n");
        assert!(encoder.is_finished());
    }

    #[test]
    fn empty_body_encodes_nothing() {
        let mut encoder = BodyEncoder::new(PayloadSize::Empty);
        let mut dst = BytesMut::new();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();
        assert!(dst.is_empty());
        assert!(encoder.is_finished());
    }
}
