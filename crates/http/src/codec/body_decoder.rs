//! Request payload decoding.
//!
//! One decoder per request body, selected from the decoded head's
//! [`PayloadSize`]: fixed Content-Length reads, chunked transfer decoding
//! (RFC 9112 §7.1, extensions and trailers skipped), or an immediate
//! end-of-stream for bodyless requests.

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Decodes the payload phase of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    NoBody,
}

impl BodyDecoder {
    pub fn new(payload_size: PayloadSize) -> Self {
        let kind = match payload_size {
            PayloadSize::Length(length) => Kind::Length(LengthDecoder::new(length)),
            PayloadSize::Chunked => Kind::Chunked(ChunkedDecoder::new()),
            PayloadSize::Empty => Kind::NoBody,
        };
        Self { kind }
    }
}

impl From<PayloadSize> for BodyDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        Self::new(payload_size)
    }
}

impl Decoder for BodyDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode(src),
            Kind::Chunked(decoder) => decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

/// Reads exactly the number of bytes announced by Content-Length.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.remaining, src.len() as u64) as usize;
        let bytes = src.split_to(len).freeze();
        self.remaining -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

/// State machine for chunked transfer decoding.
///
/// Chunk extensions are validated but ignored; trailer fields are read and
/// dropped. A zero-sized chunk terminates the body.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChunkedDecoder {
    state: ChunkedState,
    remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Hex chunk size digits
    Size,
    /// Whitespace after the size, before extension or CR
    SizeLws,
    /// Chunk extension, skipped up to CR
    Extension,
    /// LF terminating the size line
    SizeLf,
    /// Chunk data
    Data,
    /// CR after chunk data
    DataCr,
    /// LF after chunk data
    DataLf,
    /// Trailer field, skipped up to CR
    Trailer,
    /// LF terminating a trailer field
    TrailerLf,
    /// CR of the final empty line
    EndCr,
    /// LF of the final empty line
    EndLf,
    /// Terminal
    End,
}

impl ChunkedDecoder {
    fn new() -> Self {
        Self { state: ChunkedState::Size, remaining: 0 }
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
        use ChunkedState::*;

        loop {
            if self.state == End {
                trace!("finished reading chunked body");
                return Ok(Some(PayloadItem::Eof));
            }

            if self.state == Data {
                if self.remaining == 0 {
                    self.state = DataCr;
                    continue;
                }
                if src.is_empty() {
                    return Ok(None);
                }

                let len = cmp::min(self.remaining, src.len() as u64) as usize;
                let bytes = src.split_to(len).freeze();
                self.remaining -= bytes.len() as u64;
                if self.remaining == 0 {
                    self.state = DataCr;
                }
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }

            // every remaining state consumes exactly one byte
            if src.is_empty() {
                return Ok(None);
            }
            let byte = src.get_u8();

            self.state = match self.state {
                Size => match byte {
                    b @ b'0'..=b'9' => self.push_size_digit(b - b'0')?,
                    b @ b'a'..=b'f' => self.push_size_digit(b - b'a' + 10)?,
                    b @ b'A'..=b'F' => self.push_size_digit(b - b'A' + 10)?,
                    b'\t' | b' ' => SizeLws,
                    b';' => Extension,
                    b'\r' => SizeLf,
                    _ => return Err(ParseError::invalid_body("invalid chunk size digit")),
                },
                SizeLws => match byte {
                    b'\t' | b' ' => SizeLws,
                    b';' => Extension,
                    b'\r' => SizeLf,
                    _ => return Err(ParseError::invalid_body("invalid chunk size whitespace")),
                },
                Extension => match byte {
                    b'\r' => SizeLf,
                    // reject a bare LF so sloppy peers can't smuggle a line end
                    b'\n' => return Err(ParseError::invalid_body("chunk extension contains bare newline")),
                    _ => Extension,
                },
                SizeLf => match byte {
                    b'\n' if self.remaining == 0 => EndCr,
                    b'\n' => Data,
                    _ => return Err(ParseError::invalid_body("chunk size line missing LF")),
                },
                DataCr => match byte {
                    b'\r' => DataLf,
                    _ => return Err(ParseError::invalid_body("chunk data missing CR")),
                },
                DataLf => match byte {
                    b'\n' => Size,
                    _ => return Err(ParseError::invalid_body("chunk data missing LF")),
                },
                Trailer => match byte {
                    b'\r' => TrailerLf,
                    _ => Trailer,
                },
                TrailerLf => match byte {
                    b'\n' => EndCr,
                    _ => return Err(ParseError::invalid_body("trailer field missing LF")),
                },
                EndCr => match byte {
                    b'\r' => EndLf,
                    // anything else starts a trailer field
                    _ => Trailer,
                },
                EndLf => match byte {
                    b'\n' => End,
                    _ => return Err(ParseError::invalid_body("chunked body missing final LF")),
                },
                Data | End => unreachable!("handled before byte consumption"),
            };
        }
    }

    fn push_size_digit(&mut self, digit: u8) -> Result<ChunkedState, ParseError> {
        self.remaining = self
            .remaining
            .checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::invalid_body("chunk size overflows u64"))?;
        Ok(ChunkedState::Size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn decode_all(decoder: &mut BodyDecoder, src: &mut BytesMut) -> Vec<PayloadItem> {
        let mut items = Vec::new();
        loop {
            match decoder.decode(src).unwrap() {
                Some(item @ PayloadItem::Eof) => {
                    items.push(item);
                    return items;
                }
                Some(item) => items.push(item),
                None => return items,
            }
        }
    }

    #[test]
    fn length_decoder_reads_exactly_announced_bytes() {
        let mut buffer = BytesMut::from(&b"1012345678rest"[..]);
        let mut decoder = BodyDecoder::new(PayloadSize::Length(10));

        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(
            items,
            vec![PayloadItem::Chunk(Bytes::from_static(b"1012345678")), PayloadItem::Eof]
        );
        assert_eq!(&buffer[..], b"rest");
    }

    #[test]
    fn length_decoder_accumulates_partial_input() {
        let mut decoder = BodyDecoder::new(PayloadSize::Length(8));

        let mut buffer = BytesMut::from(&b"1234"[..]);
        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(items, vec![PayloadItem::Chunk(Bytes::from_static(b"1234"))]);

        let mut buffer = BytesMut::from(&b"5678"[..]);
        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(items, vec![PayloadItem::Chunk(Bytes::from_static(b"5678")), PayloadItem::Eof]);
    }

    #[test]
    fn empty_body_yields_immediate_eof() {
        let mut buffer = BytesMut::new();
        let mut decoder = BodyDecoder::new(PayloadSize::Empty);
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }

    #[test]
    fn chunked_basic() {
        let mut buffer = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = BodyDecoder::new(PayloadSize::Chunked);

        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(
            items,
            vec![PayloadItem::Chunk(Bytes::from_static(b"1234567890abcdef")), PayloadItem::Eof]
        );
    }

    #[test]
    fn chunked_multiple_chunks() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = BodyDecoder::new(PayloadSize::Chunked);

        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(
            items,
            vec![
                PayloadItem::Chunk(Bytes::from_static(b"hello")),
                PayloadItem::Chunk(Bytes::from_static(b", world")),
                PayloadItem::Eof
            ]
        );
    }

    #[test]
    fn chunked_skips_extensions_and_trailers() {
        let mut buffer = BytesMut::from(&b"5;ext=value\r\nhello\r\n0\r\nTrailer: v\r\n\r\n"[..]);
        let mut decoder = BodyDecoder::new(PayloadSize::Chunked);

        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(items, vec![PayloadItem::Chunk(Bytes::from_static(b"hello")), PayloadItem::Eof]);
    }

    #[test]
    fn chunked_partial_chunk_is_streamed() {
        let mut decoder = BodyDecoder::new(PayloadSize::Chunked);

        let mut buffer = BytesMut::from(&b"5\r\nhel"[..]);
        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(items, vec![PayloadItem::Chunk(Bytes::from_static(b"hel"))]);

        let mut buffer = BytesMut::from(&b"lo\r\n0\r\n\r\n"[..]);
        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(items, vec![PayloadItem::Chunk(Bytes::from_static(b"lo")), PayloadItem::Eof]);
    }

    #[test]
    fn chunked_rejects_invalid_size() {
        let mut buffer = BytesMut::from(&b"xyz\r\n"[..]);
        let mut decoder = BodyDecoder::new(PayloadSize::Chunked);
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn chunked_rejects_missing_crlf_after_data() {
        let mut buffer = BytesMut::from(&b"5\r\nhelloXY"[..]);
        let mut decoder = BodyDecoder::new(PayloadSize::Chunked);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item, PayloadItem::Chunk(Bytes::from_static(b"hello")));
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn chunked_rejects_size_overflow() {
        let mut buffer = BytesMut::from(&b"fffffffffffffffff\r\n"[..]);
        let mut decoder = BodyDecoder::new(PayloadSize::Chunked);
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn chunked_zero_size_body() {
        let mut buffer = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = BodyDecoder::new(PayloadSize::Chunked);
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }
}
