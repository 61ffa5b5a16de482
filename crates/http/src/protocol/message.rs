use bytes::{Buf, Bytes};

/// A decoded or to-be-encoded HTTP message part: either a header of type `T`
/// or one item of the payload stream.
///
/// The request decoder yields `Message<(RequestHeader, PayloadSize)>`; the
/// response encoder consumes `Message<(ResponseHead, PayloadSize), D>`.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

/// One item of a payload stream: a chunk of body data or the end-of-stream
/// marker.
///
/// `Eof` is an ordinary stream item rather than an out-of-band signal so that
/// body completion travels through the same pending buffer as the data it
/// terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Eof,
}

/// Size information of an HTTP payload, decided from the message headers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes (Content-Length)
    Length(u64),
    /// Payload using chunked transfer encoding
    Chunked,
    /// No payload at all
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }
}

impl<T> Message<T> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }
}

impl<D: Buf> PayloadItem<D> {
    /// Returns true if this item marks the end of the payload stream.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns the contained bytes if this is a `Chunk`, `None` for `Eof`.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Byte length of the chunk data carried by this item; `Eof` carries none.
    pub fn data_len(&self) -> Option<usize> {
        self.as_bytes().map(Bytes::len)
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

impl<T> From<Bytes> for Message<T> {
    fn from(bytes: Bytes) -> Self {
        Self::Payload(PayloadItem::Chunk(bytes))
    }
}
