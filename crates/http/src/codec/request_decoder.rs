//! Streaming HTTP request decoding.
//!
//! [`RequestDecoder`] drives two phases through one `tokio_util` [`Decoder`]:
//! first the head (`HeaderDecoder`), then the payload (a `BodyDecoder` chosen
//! from the head's framing headers). The phase is encoded in the
//! `body_decoder` field: `None` while parsing a head, `Some` while a payload
//! is in flight.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body_decoder::BodyDecoder;
use crate::codec::header_decoder::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// Decodes a connection's inbound bytes into a stream of request heads and
/// payload items.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    body_decoder: Option<BodyDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(body_decoder) = &mut self.body_decoder {
            let message = match body_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    // payload finished; the next bytes are a fresh head
                    self.body_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };
            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.body_decoder = Some(BodyDecoder::new(payload_size));
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use indoc::indoc;

    #[test]
    fn decodes_head_then_payload_then_next_head() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Host: example.com
        Content-Length: 5

        helloGET / HTTP/1.1
        Host: example.com

        "##};

        let mut buf = BytesMut::from(str);
        let mut decoder = RequestDecoder::new();

        match decoder.decode(&mut buf).unwrap() {
            Some(Message::Header((header, payload_size))) => {
                assert_eq!(header.uri().path(), "/upload");
                assert_eq!(payload_size, PayloadSize::Length(5));
            }
            _ => panic!("expected a request head"),
        }

        match decoder.decode(&mut buf).unwrap() {
            Some(Message::Payload(PayloadItem::Chunk(bytes))) => {
                assert_eq!(bytes, Bytes::from_static(b"hello"));
            }
            _ => panic!("expected a body chunk"),
        }

        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Payload(PayloadItem::Eof))));

        match decoder.decode(&mut buf).unwrap() {
            Some(Message::Header((header, payload_size))) => {
                assert_eq!(header.uri().path(), "/");
                assert_eq!(payload_size, PayloadSize::Empty);
            }
            _ => panic!("expected the second request head"),
        }
    }
}
