//! HTTP request body streaming.
//!
//! [`ReqBody`] is the consumer half of a request stream: it exposes the
//! pending buffer of a [`StreamChannel`](crate::stream::StreamChannel) through
//! the standard `http_body::Body` interface, so handlers and middleware can
//! consume request bodies without knowing about the coordination underneath.
//! Producer and consumer share one channel on the connection's task; polling a
//! chunk out of the buffer is what releases its bytes from the connection's
//! traffic accounting.

use std::cell::RefCell;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use crate::protocol::{AbortCause, PayloadItem, PayloadSize};
use crate::stream::StreamChannel;

/// The streaming body of an in-flight request.
///
/// Yields the chunks admitted into the request stream in order, ends cleanly
/// once the end-of-stream marker is consumed, and surfaces the close cause as
/// an error when the stream was torn down abnormally. `ReqBody` is `!Send` on
/// purpose: it belongs to the connection task that decodes it.
pub struct ReqBody {
    channel: Rc<RefCell<StreamChannel>>,
    payload_size: PayloadSize,
}

impl ReqBody {
    pub(crate) fn new(channel: Rc<RefCell<StreamChannel>>, payload_size: PayloadSize) -> Self {
        Self { channel, payload_size }
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = AbortCause;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.channel.borrow_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(PayloadItem::Chunk(bytes)))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Poll::Ready(Some(Ok(PayloadItem::Eof))) => Poll::Ready(None),
            Poll::Ready(Some(Err(cause))) => Poll::Ready(Some(Err(cause))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self.payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Chunked => SizeHint::new(),
            PayloadSize::Empty => SizeHint::with_exact(0),
        }
    }
}

impl std::fmt::Debug for ReqBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqBody").field("payload_size", &self.payload_size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;

    fn body_over(channel: &Rc<RefCell<StreamChannel>>) -> ReqBody {
        ReqBody::new(Rc::clone(channel), PayloadSize::Chunked)
    }

    #[test]
    fn yields_chunks_then_ends_after_eof() {
        let channel = Rc::new(RefCell::new(StreamChannel::new(|_| {})));
        let mut body = body_over(&channel);
        let mut cx = Context::from_waker(noop_waker_ref());

        assert!(matches!(Pin::new(&mut body).poll_frame(&mut cx), Poll::Pending));

        channel.borrow_mut().publish(PayloadItem::Chunk(Bytes::from_static(b"hello")));
        channel.borrow_mut().publish(PayloadItem::Eof);

        match Pin::new(&mut body).poll_frame(&mut cx) {
            Poll::Ready(Some(Ok(frame))) => {
                assert_eq!(frame.into_data().expect("data frame"), Bytes::from_static(b"hello"));
            }
            other => panic!("unexpected poll result: {other:?}"),
        }

        assert!(matches!(Pin::new(&mut body).poll_frame(&mut cx), Poll::Ready(None)));
        assert!(matches!(Pin::new(&mut body).poll_frame(&mut cx), Poll::Ready(None)));
    }

    #[test]
    fn surfaces_the_close_cause_as_an_error() {
        let channel = Rc::new(RefCell::new(StreamChannel::new(|_| {})));
        let mut body = body_over(&channel);
        let mut cx = Context::from_waker(noop_waker_ref());

        channel.borrow_mut().close(AbortCause::PeerReset);

        match Pin::new(&mut body).poll_frame(&mut cx) {
            Poll::Ready(Some(Err(cause))) => assert_eq!(cause, AbortCause::PeerReset),
            other => panic!("unexpected poll result: {other:?}"),
        }
    }

    #[test]
    fn size_hint_follows_payload_size() {
        let channel = Rc::new(RefCell::new(StreamChannel::new(|_| {})));

        let body = ReqBody::new(Rc::clone(&channel), PayloadSize::Length(42));
        assert_eq!(body.size_hint().exact(), Some(42));

        let body = ReqBody::new(Rc::clone(&channel), PayloadSize::Empty);
        assert_eq!(body.size_hint().exact(), Some(0));

        let body = ReqBody::new(channel, PayloadSize::Chunked);
        assert_eq!(body.size_hint().exact(), None);
    }
}
