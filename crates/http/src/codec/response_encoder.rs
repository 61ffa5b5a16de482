//! Streaming HTTP response encoding.

use std::io::{self, ErrorKind};

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body_encoder::BodyEncoder;
use crate::codec::header_encoder::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

/// Encodes one response after another onto a connection: a head first, then
/// payload items until the body encoder reports itself finished.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    body_encoder: Option<BodyEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.body_encoder.is_some() {
                    error!("expected a payload item but received a response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.body_encoder = Some(BodyEncoder::new(payload_size));
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(body_encoder) = &mut self.body_encoder else {
                    error!("expected a response head but received a payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                // Eof closes the payload phase regardless of kind; the next
                // message must be a head again
                let is_eof = payload_item.is_eof();
                let result = body_encoder.encode(payload_item, dst);
                if is_eof {
                    self.body_encoder.take();
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadItem;
    use bytes::Bytes;
    use http::{Response, StatusCode};

    #[test]
    fn encodes_a_full_response() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let head: ResponseHead = Response::builder().status(StatusCode::OK).body(()).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize)>::Header((head, PayloadSize::Length(5))), &mut dst).unwrap();
        encoder.encode(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("\r\n\r\nhello"));

        // the encoder is ready for the next exchange
        let head: ResponseHead = Response::builder().status(StatusCode::OK).body(()).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize)>::Header((head, PayloadSize::Empty)), &mut dst).unwrap();
    }

    #[test]
    fn payload_before_head_is_an_error() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let result =
            encoder.encode(Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Eof), &mut dst);
        assert!(result.is_err());
    }
}
